use crate::relay::RelayState;
use thiserror::Error;

/// Transport-level relay failures.
///
/// An upstream that answers with an error status is *not* a `RelayError`:
/// that case is folded into a content frame. These variants cover the cases
/// where no usable answer could be obtained at all.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("upstream connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("upstream body read failed: {0}")]
    Body(#[source] reqwest::Error),

    #[error("upstream line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// A rejected [`RelayState`] transition.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid relay transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: RelayState,
    pub to: RelayState,
}
