//! Line-oriented reading of an upstream event stream.

const DATA_PREFIX: &str = "data:";

/// Payload that marks the end of the upstream stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Classification of one upstream line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLine<'a> {
    /// Not a data line (comment, keep-alive, `event:` field, blank).
    Skip,
    /// The termination sentinel.
    Done,
    /// A data payload, trimmed.
    Data(&'a str),
}

/// Classifies a single line, without its line terminator.
pub fn parse_event_line(line: &str) -> EventLine<'_> {
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return EventLine::Skip;
    };
    let payload = rest.trim();
    if payload == DONE_SENTINEL {
        EventLine::Done
    } else {
        EventLine::Data(payload)
    }
}

/// Longest line accepted from upstream, terminator excluded.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reassembles lines from arbitrarily split network chunks.
///
/// A line ends at `\n`, `\r\n` or a bare `\r`. Bytes are buffered until a
/// terminator arrives, so a multi-byte UTF-8 character split across two
/// chunks is decoded intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    /// Start of the first unconsumed line.
    start: usize,
    /// Bytes before this offset hold no terminator.
    scanned: usize,
    /// The last line ended in `\r` at the very end of the buffer, so a
    /// leading `\n` in the next chunk belongs to that terminator.
    skip_lf: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes of the current unterminated line.
    pub fn pending(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Pops the next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        if self.skip_lf && self.start < self.buf.len() {
            self.skip_lf = false;
            if self.buf[self.start] == b'\n' {
                self.start += 1;
                self.scanned = self.scanned.max(self.start);
            }
        }

        let from = self.scanned.max(self.start);
        let Some(offset) = self.buf[from..]
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
        else {
            self.scanned = self.buf.len();
            return None;
        };
        let pos = from + offset;
        let line = String::from_utf8_lossy(&self.buf[self.start..pos]).into_owned();

        self.start = pos + 1;
        if self.buf[pos] == b'\r' {
            match self.buf.get(self.start) {
                Some(b'\n') => self.start += 1,
                Some(_) => {}
                None => self.skip_lf = true,
            }
        }
        self.scanned = self.start;
        Some(line)
    }

    /// Returns the trailing unterminated line, if any, at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        let rest = &self.buf[self.start..];
        let line = if rest.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(rest).into_owned())
        };
        self.buf.clear();
        self.start = 0;
        self.scanned = 0;
        self.skip_lf = false;
        line
    }
}
