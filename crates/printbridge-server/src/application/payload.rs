//! Decoders for binary `append` payloads.
//!
//! WebSocket text frames cannot carry arbitrary bytes, so pages encode
//! printer commands that contain control characters (ESC, NUL...) as
//! Base64 (`append64`) or hex (`appendHex`).

use super::CommandError;

/// Decodes standard (RFC 4648 §4) Base64.
///
/// ASCII whitespace is skipped so pages can send line-wrapped data.
/// Trailing `=` padding is optional, but when present it must be correct.
///
/// # Errors
///
/// [`CommandError::InvalidPayload`] for characters outside the alphabet,
/// data after padding, or a length no valid encoding can have.
pub fn base64_decode(text: &str) -> Result<Vec<u8>, CommandError> {
    let invalid = |reason: &str| CommandError::InvalidPayload(format!("bad base64: {reason}"));

    let mut out = Vec::with_capacity(text.len() / 4 * 3);
    // Bits not yet emitted, right-aligned in `acc`.
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    let mut symbols = 0usize;
    let mut padding = 0usize;

    for c in text.bytes().filter(|b| !b.is_ascii_whitespace()) {
        if c == b'=' {
            padding += 1;
            continue;
        }
        if padding > 0 {
            return Err(invalid("data after padding"));
        }
        let value = sextet(c).ok_or_else(|| invalid(&format!("unexpected byte {c:#04x}")))?;
        acc = (acc << 6) | u32::from(value);
        bits += 6;
        symbols += 1;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
            acc &= (1 << bits) - 1;
        }
    }

    if symbols % 4 == 1 {
        return Err(invalid("truncated input"));
    }
    if padding > 0 && (padding > 2 || (symbols + padding) % 4 != 0) {
        return Err(invalid("wrong padding"));
    }
    Ok(out)
}

/// Maps one alphabet character to its 6-bit value.
fn sextet(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a' + 26),
        b'0'..=b'9' => Some(c - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decodes hex in either of the two forms pages use:
///
/// - plain pairs, optionally space separated: `1B40`, `1b 40`
/// - `x`-prefixed bytes: `x1Bx40`, which also allows single digits (`x1Bx0`)
///
/// # Errors
///
/// [`CommandError::InvalidPayload`] for anything that is not hex, an odd
/// number of digits in the plain form, or an `x` group above `FF`.
pub fn hex_decode(text: &str) -> Result<Vec<u8>, CommandError> {
    let text = text.trim();

    if text.starts_with(['x', 'X']) {
        return text
            .split(['x', 'X'])
            .filter(|group| !group.is_empty())
            .map(|group| {
                if group.len() > 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(CommandError::InvalidPayload(format!(
                        "bad hex byte 'x{group}'"
                    )));
                }
                u8::from_str_radix(group, 16)
                    .map_err(|e| CommandError::InvalidPayload(format!("bad hex byte 'x{group}': {e}")))
            })
            .collect();
    }

    let compact: String = text.split_whitespace().collect();
    hex::decode(&compact).map_err(|e| CommandError::InvalidPayload(format!("bad hex: {e}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_full_and_padded_groups() {
        assert_eq!(base64_decode("TWFu").unwrap(), b"Man");
        assert_eq!(base64_decode("TWE=").unwrap(), b"Ma");
        assert_eq!(base64_decode("TQ==").unwrap(), b"M");
        assert_eq!(base64_decode("").unwrap(), b"");
    }

    #[test]
    fn test_base64_padding_is_optional() {
        assert_eq!(base64_decode("TWE").unwrap(), b"Ma");
        assert_eq!(base64_decode("TQ").unwrap(), b"M");
    }

    #[test]
    fn test_base64_binary_and_whitespace() {
        // ESC @ (printer reset) followed by 0xFF, wrapped across lines.
        assert_eq!(base64_decode("G0D/\n").unwrap(), vec![0x1B, 0x40, 0xFF]);
        assert_eq!(base64_decode(" G0 D/ ").unwrap(), vec![0x1B, 0x40, 0xFF]);
    }

    #[test]
    fn test_base64_rejects_malformed_input() {
        for bad in ["T", "TWFuT", "TW!u", "TQ=x", "TQ===", "TWE=="] {
            assert!(
                matches!(base64_decode(bad), Err(CommandError::InvalidPayload(_))),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn test_hex_plain_pairs() {
        assert_eq!(hex_decode("1B40").unwrap(), vec![0x1B, 0x40]);
        assert_eq!(hex_decode("1b 40 0a").unwrap(), vec![0x1B, 0x40, 0x0A]);
    }

    #[test]
    fn test_hex_x_prefixed_form() {
        assert_eq!(hex_decode("x1Bx40").unwrap(), vec![0x1B, 0x40]);
        assert_eq!(hex_decode("x1bx0").unwrap(), vec![0x1B, 0x00]);
    }

    #[test]
    fn test_hex_rejects_malformed_input() {
        for bad in ["1B4", "zz", "x1B40", "x1Gx40", "x+1"] {
            assert!(
                matches!(hex_decode(bad), Err(CommandError::InvalidPayload(_))),
                "expected '{bad}' to be rejected"
            );
        }
    }
}
