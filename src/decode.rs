use std::fmt;

/// A reply exactly as the transport produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResponse {
    /// One undivided byte sequence, from a budgeted read.
    Bytes(Vec<u8>),
    /// Terminator-framed records, from a line read.
    Lines(Vec<Vec<u8>>),
}

/// A reply after decoding. Mirrors the shape of the raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextResponse {
    Line(String),
    Lines(Vec<String>),
}

impl TextResponse {
    /// The first line, or the whole reply when it is undivided. Empty when
    /// the reply had no records.
    pub fn first_line(&self) -> &str {
        match self {
            Self::Line(line) => line,
            Self::Lines(lines) => lines.first().map_or("", String::as_str),
        }
    }

    /// All lines; an undivided reply becomes a single-record vector.
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Self::Line(line) => vec![line],
            Self::Lines(lines) => lines,
        }
    }
}

impl fmt::Display for TextResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(line) => f.write_str(line),
            Self::Lines(lines) => f.write_str(&lines.join("\n")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Response is not valid UTF-8 (first bad byte at offset {offset})")]
    NotText { offset: usize },
}

/// Decode a raw reply into text.
///
/// Record order and the bytes-vs-lines shape are preserved; nothing is
/// trimmed. The only runtime failure is non-UTF-8 payload.
pub fn decode(raw: RawResponse) -> Result<TextResponse, DecodeError> {
    match raw {
        RawResponse::Bytes(bytes) => Ok(TextResponse::Line(decode_record(bytes)?)),
        RawResponse::Lines(lines) => {
            let mut decoded = Vec::with_capacity(lines.len());
            for line in lines {
                decoded.push(decode_record(line)?);
            }
            Ok(TextResponse::Lines(decoded))
        }
    }
}

fn decode_record(bytes: Vec<u8>) -> Result<String, DecodeError> {
    String::from_utf8(bytes).map_err(|e| DecodeError::NotText {
        offset: e.utf8_error().valid_up_to(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_bytes_to_line() {
        let raw = RawResponse::Bytes(b"Keithley,3390,1.0\n".to_vec());
        assert_eq!(
            decode(raw).unwrap(),
            TextResponse::Line("Keithley,3390,1.0\n".to_string())
        );
    }

    #[test]
    fn test_decodes_lines_preserving_order() {
        let raw = RawResponse::Lines(vec![b"first".to_vec(), b"second".to_vec()]);
        assert_eq!(
            decode(raw).unwrap(),
            TextResponse::Lines(vec!["first".to_string(), "second".to_string()])
        );
    }

    #[test]
    fn test_rejects_non_utf8() {
        let raw = RawResponse::Bytes(vec![b'o', b'k', 0xFF, 0xFE]);
        let DecodeError::NotText { offset } = decode(raw).unwrap_err();
        assert_eq!(offset, 2);
    }

    #[test]
    fn test_rejects_non_utf8_in_any_record() {
        let raw = RawResponse::Lines(vec![b"fine".to_vec(), vec![0x80]]);
        assert!(decode(raw).is_err());
    }

    #[test]
    fn test_first_line_and_into_lines() {
        let text = TextResponse::Lines(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(text.first_line(), "a");
        assert_eq!(text.into_lines(), vec!["a", "b"]);

        let single = TextResponse::Line("only".to_string());
        assert_eq!(single.first_line(), "only");
        assert_eq!(single.into_lines(), vec!["only"]);
    }
}
