//! Reading and writing binary protocol messages on async streams.
//!
//! The same framing is used towards clients and towards backends.

use crate::error::Error;
use bytes::BytesMut;
use protocol_memcache::binary::{HEADER_LEN, Header, Message};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read exactly one message: the 24-byte header, then `body_len` bytes.
///
/// A stream that ends before the message is complete yields an
/// `UnexpectedEof` error.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Message> {
    let mut raw = [0u8; HEADER_LEN];
    reader.read_exact(&mut raw).await?;
    let header = Header::parse(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut body = BytesMut::zeroed(header.body_len as usize);
    reader.read_exact(&mut body).await?;

    Ok(Message::from_body(header, body.freeze()))
}

/// Like [`read_message`], but a stream that ends cleanly before the first
/// header byte yields `None`.
pub async fn read_next_message<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> io::Result<Option<Message>> {
    let mut raw = [0u8; HEADER_LEN];
    if reader.read(&mut raw[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut raw[1..]).await?;
    let header = Header::parse(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut body = BytesMut::zeroed(header.body_len as usize);
    reader.read_exact(&mut body).await?;

    Ok(Some(Message::from_body(header, body.freeze())))
}

/// Encode `message` and write it in full.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), Error> {
    let mut buf = BytesMut::with_capacity(message.encoded_len());
    message.encode(&mut buf)?;
    writer.write_all(&buf).await?;
    Ok(())
}
