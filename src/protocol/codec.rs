use bytes::{Buf, Bytes, BytesMut};
use log::warn;
use tokio_util::codec::Decoder;

use crate::error::FramingError;

use super::message::{Message, TERMINATOR};

/// Size of the big-endian length that precedes every file payload.
pub const PAYLOAD_LENGTH_BYTES: usize = 8;

pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;
pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Message(Message),
    /// Part of the payload announced by the preceding `FILE:` message.
    Chunk(Bytes),
    /// The announced payload has been delivered in full.
    PayloadEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Text,
    PayloadLength,
    Payload { remaining: u64 },
}

/// Stateful decoder for one connection.
///
/// Bytes that do not yet form a complete frame stay in the read buffer
/// and are completed by later reads, so a single read may yield zero,
/// one or many frames.
#[derive(Debug)]
pub struct FrameCodec {
    state: DecodeState,
    max_frame_length: usize,
    max_payload_size: u64,
    // Offset already scanned for a terminator.
    next_index: usize,
}

impl FrameCodec {
    pub fn new(max_frame_length: usize, max_payload_size: u64) -> Self {
        Self {
            state: DecodeState::Text,
            max_frame_length,
            max_payload_size,
            next_index: 0,
        }
    }

    fn decode_text(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FramingError> {
        let read_to = src.len().min(self.max_frame_length + 1);
        let found = src[self.next_index..read_to]
            .iter()
            .position(|b| *b == TERMINATOR);

        match found {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let mut frame = src.split_to(end + 1);
                frame.truncate(end);
                let text = match String::from_utf8(frame.to_vec()) {
                    Ok(text) => text,
                    // Il frame è già consumato: si sostituiscono i byte non validi
                    Err(e) => {
                        warn!("Text frame is not valid UTF-8 ({}), decoding lossily", e);
                        String::from_utf8_lossy(e.as_bytes()).into_owned()
                    }
                };
                let message = Message::parse(text);
                if matches!(message, Message::File(_)) {
                    self.state = DecodeState::PayloadLength;
                }
                Ok(Some(Frame::Message(message)))
            }
            None if src.len() > self.max_frame_length => Err(FramingError::FrameTooLong {
                limit: self.max_frame_length,
            }),
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LENGTH, DEFAULT_MAX_PAYLOAD_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.state {
            DecodeState::Text => self.decode_text(src),
            DecodeState::PayloadLength => {
                if src.len() < PAYLOAD_LENGTH_BYTES {
                    src.reserve(PAYLOAD_LENGTH_BYTES - src.len());
                    return Ok(None);
                }
                let size = src.get_u64();
                if size > self.max_payload_size {
                    return Err(FramingError::PayloadTooLarge {
                        size,
                        limit: self.max_payload_size,
                    });
                }
                self.state = DecodeState::Payload { remaining: size };
                self.decode(src)
            }
            DecodeState::Payload { remaining: 0 } => {
                self.state = DecodeState::Text;
                Ok(Some(Frame::PayloadEnd))
            }
            DecodeState::Payload { remaining } => {
                if src.is_empty() {
                    return Ok(None);
                }
                let take = remaining.min(src.len() as u64) as usize;
                self.state = DecodeState::Payload {
                    remaining: remaining - take as u64,
                };
                Ok(Some(Frame::Chunk(src.split_to(take).freeze())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use tokio_test::io::Builder;
    use tokio_util::codec::FramedRead;

    use super::*;
    use crate::protocol::message::encode_text;

    fn payload_header(len: u64) -> [u8; PAYLOAD_LENGTH_BYTES] {
        len.to_be_bytes()
    }

    #[test]
    fn yields_every_frame_in_one_buffer() {
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&encode_text("alice: one").unwrap());
        buffer.extend_from_slice(&encode_text("alice: two").unwrap());

        let mut codec = FrameCodec::default();
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(Frame::Message(Message::Chat("alice: one".into())))
        );
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(Frame::Message(Message::Chat("alice: two".into())))
        );
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let mut codec = FrameCodec::default();
        let mut buffer = BytesMut::from(&b"bob: hel"[..]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"lo\0");
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(Frame::Message(Message::Chat("bob: hello".into())))
        );
    }

    #[test]
    fn overlong_frame_is_rejected() {
        let mut codec = FrameCodec::new(4, DEFAULT_MAX_PAYLOAD_SIZE);
        let mut buffer = BytesMut::from(&b"abcd\0"[..]);
        assert!(codec.decode(&mut buffer).unwrap().is_some());

        let mut buffer = BytesMut::from(&b"abcde"[..]);
        assert!(matches!(
            codec.decode(&mut buffer),
            Err(FramingError::FrameTooLong { limit: 4 })
        ));
    }

    #[test]
    fn invalid_utf8_frame_does_not_block_the_next() {
        let mut codec = FrameCodec::default();
        let mut buffer = BytesMut::from(&b"eve: caf\xe9\0eve: after\0"[..]);

        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(Frame::Message(Message::Chat("eve: caf\u{FFFD}".into())))
        );
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(Frame::Message(Message::Chat("eve: after".into())))
        );
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut codec = FrameCodec::new(DEFAULT_MAX_FRAME_LENGTH, 3);
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&encode_text("FILE:big.bin").unwrap());
        buffer.extend_from_slice(&payload_header(4));
        buffer.extend_from_slice(b"abcd");

        assert!(codec.decode(&mut buffer).unwrap().is_some());
        assert!(matches!(
            codec.decode(&mut buffer),
            Err(FramingError::PayloadTooLarge { size: 4, limit: 3 })
        ));
    }

    #[test]
    fn empty_payload_ends_immediately() {
        let mut codec = FrameCodec::default();
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&encode_text("FILE:empty.txt").unwrap());
        buffer.extend_from_slice(&payload_header(0));
        buffer.extend_from_slice(&encode_text("CRC64:7").unwrap());

        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(Frame::Message(Message::File("empty.txt".into())))
        );
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(Frame::PayloadEnd));
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(Frame::Message(Message::Crc64("7".into())))
        );
    }

    #[tokio::test]
    async fn upload_split_across_reads() {
        let mut first = encode_text("FILE:notes.txt").unwrap();
        first.extend_from_slice(&payload_header(10)[..3]);
        let mut second = payload_header(10)[3..].to_vec();
        second.extend_from_slice(b"hello");
        let mut third = b"world".to_vec();
        third.extend_from_slice(&encode_text("CRC64:99").unwrap());

        let stream = Builder::new()
            .read(&first)
            .read(&second)
            .read(&third)
            .build();
        let frames: Vec<Frame> = FramedRead::new(stream, FrameCodec::default())
            .map(|frame| frame.unwrap())
            .collect()
            .await;

        let payload: Vec<u8> = frames
            .iter()
            .filter_map(|frame| match frame {
                Frame::Chunk(chunk) => Some(chunk.to_vec()),
                _ => None,
            })
            .flatten()
            .collect();

        assert_eq!(
            frames.first(),
            Some(&Frame::Message(Message::File("notes.txt".into())))
        );
        assert_eq!(payload, b"helloworld");
        assert_eq!(
            &frames[frames.len() - 2..],
            &[
                Frame::PayloadEnd,
                Frame::Message(Message::Crc64("99".into()))
            ]
        );
    }

    #[tokio::test]
    async fn payload_bytes_may_contain_terminators() {
        let mut bytes = encode_text("FILE:blob.bin").unwrap();
        bytes.extend_from_slice(&payload_header(3));
        bytes.extend_from_slice(&[0, 1, 0]);
        bytes.extend_from_slice(&encode_text("carol: done").unwrap());

        let stream = Builder::new().read(&bytes).build();
        let frames: Vec<Frame> = FramedRead::new(stream, FrameCodec::default())
            .map(|frame| frame.unwrap())
            .collect()
            .await;

        assert_eq!(
            frames,
            vec![
                Frame::Message(Message::File("blob.bin".into())),
                Frame::Chunk(Bytes::from_static(&[0, 1, 0])),
                Frame::PayloadEnd,
                Frame::Message(Message::Chat("carol: done".into())),
            ]
        );
    }
}
