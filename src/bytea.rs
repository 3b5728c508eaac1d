use std::fmt;

/// Renders raw bytes as the body of a PostgreSQL `E'...'` bytea literal.
///
/// Each byte becomes two backslashes followed by its three-digit, zero-padded
/// octal value. The string parser collapses the doubled backslash, leaving
/// `\ooo` for the bytea input routine.
pub struct ByteaLiteral<'a>(pub &'a [u8]);

impl fmt::Display for ByteaLiteral<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "\\\\{byte:03o}")?;
        }
        Ok(())
    }
}

pub fn encode(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    ByteaLiteral(bytes).to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Width of a single escaped byte in the output text.
    const ESCAPED_BYTE_LEN: usize = 5;

    /// Inverse of `encode`, used to check emitted literals.
    pub(crate) fn decode(literal: &str) -> Option<Vec<u8>> {
        let bytes = literal.as_bytes();
        if bytes.len() % ESCAPED_BYTE_LEN != 0 {
            return None;
        }

        bytes
            .chunks(ESCAPED_BYTE_LEN)
            .map(|chunk| {
                if &chunk[..2] != b"\\\\" {
                    return None;
                }
                let digits = std::str::from_utf8(&chunk[2..]).ok()?;
                u8::from_str_radix(digits, 8).ok()
            })
            .collect()
    }

    #[test]
    fn test_encode_empty_is_empty_string() {
        assert_eq!(encode(&[]), "");
    }

    #[test]
    fn test_encode_pads_to_three_digits() {
        assert_eq!(encode(&[0x41, 0x0A]), r"\\101\\012");
        assert_eq!(encode(&[0x00]), r"\\000");
        assert_eq!(encode(&[0xFF]), r"\\377");
    }

    #[test]
    fn test_encode_escapes_quotes_and_backslashes() {
        // Neither byte may appear unescaped inside the literal
        let encoded = encode(b"'\\");
        assert_eq!(encoded, r"\\047\\134");
        assert!(!encoded.contains('\''));
    }

    #[test]
    fn test_display_matches_encode() {
        let data = b"GIF89a";
        assert_eq!(ByteaLiteral(data).to_string(), encode(data));
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        assert_eq!(decode(r"\\10"), None);
        assert_eq!(decode(r"ab101"), None);
        assert_eq!(decode(r"\\999"), None);
    }

    proptest! {
        #[test]
        fn prop_encode_round_trips(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let encoded = encode(&data);
            prop_assert_eq!(encoded.len(), data.len() * ESCAPED_BYTE_LEN);
            prop_assert_eq!(decode(&encoded), Some(data));
        }
    }
}
