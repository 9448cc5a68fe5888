use crate::error::FramingError;

/// Byte that ends every text frame.
pub const TERMINATOR: u8 = 0;

pub const FILE_PREFIX: &str = "FILE:";
pub const CRC64_PREFIX: &str = "CRC64:";

/// A decoded text command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `FILE:<name>`, announces a payload that follows immediately.
    File(String),
    /// `CRC64:<value>`, the sender's hash for the file it just uploaded.
    /// Kept as raw text so an unparsable value can still be reported.
    Crc64(String),
    /// Anything else, normally `<name>: <text>`.
    Chat(String),
}

impl Message {
    pub fn parse(text: String) -> Self {
        if let Some(name) = text.strip_prefix(FILE_PREFIX) {
            return Message::File(name.to_string());
        }

        let is_crc64 = text
            .get(..CRC64_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(CRC64_PREFIX));
        if is_crc64 {
            Message::Crc64(text[CRC64_PREFIX.len()..].to_string())
        } else {
            Message::Chat(text)
        }
    }

    pub fn crc64(hash: u64) -> Self {
        Message::Crc64(hash.to_string())
    }

    pub fn to_text(&self) -> String {
        match self {
            Message::File(name) => format!("{FILE_PREFIX}{name}"),
            Message::Crc64(value) => format!("{CRC64_PREFIX}{value}"),
            Message::Chat(text) => text.clone(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, FramingError> {
        encode_text(&self.to_text())
    }
}

/// Appends the terminator to `text`, which must not contain one itself.
pub fn encode_text(text: &str) -> Result<Vec<u8>, FramingError> {
    if let Some(index) = text.bytes().position(|b| b == TERMINATOR) {
        return Err(FramingError::EmbeddedTerminator(index));
    }
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(TERMINATOR);
    Ok(bytes)
}

/// Returns the text before the first terminator in `buffer[..n]`.
pub fn decode_text(buffer: &[u8], n: usize) -> Result<String, FramingError> {
    let received = &buffer[..n.min(buffer.len())];
    let end = received
        .iter()
        .position(|b| *b == TERMINATOR)
        .ok_or(FramingError::MissingTerminator(received.len()))?;

    Ok(String::from_utf8(received[..end].to_vec())?)
}

pub fn parse_crc64(value: &str) -> Result<u64, FramingError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| FramingError::InvalidHash(value.to_string()))
}

/// Splits a chat line of the form `<name>: <text>`.
pub fn split_chat(line: &str) -> Option<(&str, &str)> {
    let (name, text) = line.split_once(": ")?;
    if name.is_empty() {
        None
    } else {
        Some((name, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        for text in ["", "hello", "alice: ciao a tutti", "FILE:notes.txt", "émoji ✓"] {
            let bytes = encode_text(text).unwrap();
            assert_eq!(bytes.last(), Some(&TERMINATOR));
            assert_eq!(decode_text(&bytes, bytes.len()).unwrap(), text);
        }
    }

    #[test]
    fn embedded_terminator_is_refused() {
        assert!(matches!(
            encode_text("a\0FILE:x"),
            Err(FramingError::EmbeddedTerminator(1))
        ));
        assert!(Message::Chat("alice: a\0b".into()).encode().is_err());
    }

    #[test]
    fn decode_ignores_bytes_after_terminator() {
        let mut bytes = encode_text("first").unwrap();
        bytes.extend_from_slice(&encode_text("second").unwrap());
        assert_eq!(decode_text(&bytes, bytes.len()).unwrap(), "first");
    }

    #[test]
    fn decode_without_terminator_fails() {
        let bytes = b"no terminator here\0";
        let err = decode_text(bytes, 5).unwrap_err();
        assert!(matches!(err, FramingError::MissingTerminator(5)));
    }

    #[test]
    fn parse_recognizes_commands() {
        assert_eq!(
            Message::parse("FILE:notes.txt".into()),
            Message::File("notes.txt".into())
        );
        assert_eq!(
            Message::parse("crc64:42".into()),
            Message::Crc64("42".into())
        );
        assert_eq!(
            Message::parse("bob: FILE:x".into()),
            Message::Chat("bob: FILE:x".into())
        );
    }

    #[test]
    fn crc64_values() {
        assert_eq!(parse_crc64("18446744073709551615").unwrap(), u64::MAX);
        assert!(matches!(
            parse_crc64("12abc"),
            Err(FramingError::InvalidHash(_))
        ));
        assert!(parse_crc64("-1").is_err());
    }

    #[test]
    fn chat_lines_split_on_first_separator() {
        assert_eq!(split_chat("alice: hi: there"), Some(("alice", "hi: there")));
        assert_eq!(split_chat(": anonymous"), None);
        assert_eq!(split_chat("no separator"), None);
    }
}
