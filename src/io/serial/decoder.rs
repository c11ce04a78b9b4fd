// src/io/serial/decoder.rs
//
// Incremental UTF-8 decoding for streamed serial bytes.
// Read chunks can split a multi-byte character anywhere; the trailing
// incomplete sequence is carried over to the next feed() call.

/// Stateful text decoder for a byte stream.
///
/// Invalid sequences inside a chunk decode to U+FFFD rather than failing the
/// stream. An incomplete sequence at the end of a chunk is held back until
/// the rest of it arrives.
pub struct StreamDecoder {
    remainder: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        StreamDecoder {
            remainder: Vec::new(),
        }
    }

    /// Feed raw bytes into the decoder.
    /// Returns the text decodable from the carried remainder plus `data`;
    /// may be empty when the chunk only extends an incomplete sequence.
    pub fn feed(&mut self, data: &[u8]) -> String {
        self.remainder.extend_from_slice(data);
        let buf = std::mem::take(&mut self.remainder);

        let mut out = String::new();
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        // Invalid sequence: substitute and keep going
                        Some(skip) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[skip..];
                        }
                        // Incomplete sequence at the end: carry it over
                        None => {
                            self.remainder = after.to_vec();
                            return out;
                        }
                    }
                }
            }
        }

        out
    }

    /// Drop any carried partial sequence.
    /// Call when a session ends so stale bytes never leak into the next one.
    pub fn reset(&mut self) {
        self.remainder.clear();
    }

    /// Whether a partial multi-byte sequence is currently carried over.
    pub fn has_remainder(&self) -> bool {
        !self.remainder.is_empty()
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(b"hello\n"), "hello\n");
        assert!(!decoder.has_remainder());
    }

    #[test]
    fn test_split_two_byte_char() {
        let mut decoder = StreamDecoder::new();
        // "é" is 0xC3 0xA9
        assert_eq!(decoder.feed(&[b'h', 0xC3]), "h");
        assert!(decoder.has_remainder());
        assert_eq!(decoder.feed(&[0xA9, b'!']), "é!");
        assert!(!decoder.has_remainder());
    }

    #[test]
    fn test_split_four_byte_char_three_ways() {
        let mut decoder = StreamDecoder::new();
        // U+1F496 is 0xF0 0x9F 0x92 0x96
        assert_eq!(decoder.feed(&[0xF0]), "");
        assert_eq!(decoder.feed(&[0x9F, 0x92]), "");
        assert_eq!(decoder.feed(&[0x96]), "\u{1F496}");
    }

    #[test]
    fn test_concatenation_matches_full_decode() {
        // Any split of a valid UTF-8 sequence must concatenate to the full decode
        let full = "temp=23.5°C ✓\n";
        let bytes = full.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = StreamDecoder::new();
            let mut out = decoder.feed(&bytes[..split]);
            out.push_str(&decoder.feed(&bytes[split..]));
            assert_eq!(out, full, "split at byte {}", split);
        }
    }

    #[test]
    fn test_invalid_byte_substituted() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
        assert!(!decoder.has_remainder());
    }

    #[test]
    fn test_truncated_sequence_substituted_on_new_data() {
        let mut decoder = StreamDecoder::new();
        // 0xC3 starts a two-byte char, but 'x' cannot continue it
        assert_eq!(decoder.feed(&[0xC3]), "");
        assert_eq!(decoder.feed(&[b'x']), "\u{FFFD}x");
    }

    #[test]
    fn test_reset_drops_remainder() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(&[0xF0, 0x9F]);
        assert!(decoder.has_remainder());
        decoder.reset();
        assert!(!decoder.has_remainder());
        // The dangling continuation byte alone is invalid, not a heart emoji
        assert_eq!(decoder.feed(&[0x92, 0x96]), "\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn test_empty_feed() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(&[]), "");
    }
}
