//! The text command format pages send.
//!
//! Every WebSocket text frame is one command: a verb, a single space, and a
//! verb-specific payload.
//!
//! ```text
//! append ^XA^FO50,50^FDHello^FS^XZ
//! ──┬─── ──────────────┬──────────
//!  verb             payload
//! ```
//!
//! A frame with no space at all carries no payload and is never dispatched,
//! even when the text matches a known verb.  Pages that want a payload-less
//! verb to run send a trailing space or a dummy argument (`"print x"`).

/// A parsed command, borrowing from the frame text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    /// Matched case-sensitively against the verb table.
    pub verb: &'a str,
    /// Everything after the first space, untouched.  May be empty.
    pub payload: &'a str,
}

impl<'a> Command<'a> {
    /// Splits `text` at its first space.
    ///
    /// Returns `None` when `text` contains no space.
    ///
    /// ```rust
    /// use printbridge_server::domain::Command;
    ///
    /// let cmd = Command::parse("findPrinter zebra").unwrap();
    /// assert_eq!(cmd.verb, "findPrinter");
    /// assert_eq!(cmd.payload, "zebra");
    ///
    /// assert!(Command::parse("qzReady").is_none());
    /// ```
    pub fn parse(text: &'a str) -> Option<Self> {
        let (verb, payload) = text.split_once(' ')?;
        Some(Self { verb, payload })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
