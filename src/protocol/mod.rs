//! Wire format shared by client and server.
//!
//! Text frames are UTF-8 terminated by a single `0x00`. A `FILE:<name>`
//! frame is followed by an 8-byte big-endian length and exactly that many
//! payload bytes.

pub mod codec;
pub mod message;

pub use codec::{Frame, FrameCodec};
pub use message::{Message, decode_text, encode_text, parse_crc64, split_chat};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub async fn write_message<W>(writer: &mut W, message: &Message) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = message
        .encode()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    writer.write_all(&bytes).await?;
    writer.flush().await
}

/// Writes the length prefix and then copies exactly `len` bytes from `source`.
pub async fn write_payload<W, R>(writer: &mut W, source: R, len: u64) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    writer.write_u64(len).await?;
    let copied = tokio::io::copy(&mut source.take(len), writer).await?;
    if copied != len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("payload shrank while sending: {copied} of {len} bytes"),
        ));
    }
    writer.flush().await
}
