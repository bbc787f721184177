//! Personas and system-prompt composition for rolechat.
//!
//! A persona is a [`RoleCard`]: a fixed system prompt plus the metadata a
//! client needs to find it. The [`RoleCatalog`] holds the built-in cards for
//! the lifetime of the process and is shared read-only between requests.
//!
//! The [`PromptComposer`] turns a card into a [`PromptBuild`]: the card's
//! system prompt plus an ordered list of behavioral guidelines. Rendering
//! the guidelines into the final system message is left to the caller so
//! that formatting choices stay out of this crate.
//!
//! # Usage
//!
//! ```rust
//! use rolechat_persona::{PromptComposer, RoleCatalog};
//!
//! let catalog = RoleCatalog::builtin();
//! let role = catalog.get("socrates").expect("built-in role");
//! let prompt = PromptComposer.build(role, "What is justice?");
//! assert_eq!(prompt.system_message, role.system_prompt);
//! assert_eq!(prompt.guidelines.len(), 5);
//! ```

mod catalog;
mod composer;

pub use catalog::{RoleCard, RoleCatalog, RoleSummary};
pub use composer::{PromptBuild, PromptComposer};

#[cfg(test)]
mod tests;
