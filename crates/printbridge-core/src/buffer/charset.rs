//! Text encodings accepted by `append` and `setEncoding`.
//!
//! Raw printer languages (ZPL, EPL, ESC/POS) are byte oriented.  Web pages
//! send text, so the session has to pick how that text becomes bytes.  Most
//! thermal printers expect a single-byte code page, which is why ISO-8859-1
//! and US-ASCII are supported next to the Unicode encodings.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Returned when a charset name is not one of the supported encodings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported charset: {0}")]
pub struct UnknownCharset(pub String);

/// A text encoding used to turn command payloads into job bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Utf16Be,
    Utf16Le,
    /// Latin-1: one byte per code point up to U+00FF.
    Iso8859_1,
    /// Seven-bit ASCII.
    UsAscii,
}

/// Byte written for characters the target charset cannot represent.
const REPLACEMENT: u8 = b'?';

impl Charset {
    /// Canonical IANA name.
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Utf16Be => "UTF-16BE",
            Charset::Utf16Le => "UTF-16LE",
            Charset::Iso8859_1 => "ISO-8859-1",
            Charset::UsAscii => "US-ASCII",
        }
    }

    /// Encodes `text`, substituting `?` for unmappable characters.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => text.as_bytes().to_vec(),
            Charset::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Charset::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Charset::Iso8859_1 => single_byte(text, 0xFF),
            Charset::UsAscii => single_byte(text, 0x7F),
        }
    }
}

fn single_byte(text: &str, max: u32) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let cp = u32::from(c);
            if cp <= max {
                cp as u8
            } else {
                REPLACEMENT
            }
        })
        .collect()
}

impl FromStr for Charset {
    type Err = UnknownCharset;

    /// Parses common charset names case-insensitively (`"utf-8"`, `"UTF8"`,
    /// `"latin1"`, `"ISO-8859-1"`, `"ascii"`...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "utf8" => Ok(Charset::Utf8),
            "utf16" | "utf16be" => Ok(Charset::Utf16Be),
            "utf16le" => Ok(Charset::Utf16Le),
            "iso88591" | "latin1" | "cp819" => Ok(Charset::Iso8859_1),
            "usascii" | "ascii" => Ok(Charset::UsAscii),
            _ => Err(UnknownCharset(s.to_string())),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
