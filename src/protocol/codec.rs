//! Length-prefixed framing.
//!
//! Every message is a 4-byte big-endian body length followed by the JSON
//! body. A body larger than the configured limit is a protocol error and the
//! connection is dropped; nothing is ever silently truncated.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{length_delimited, Framed, LengthDelimitedCodec};

use crate::error::{Error, Result};

pub type FramedStream<T> = Framed<T, LengthDelimitedCodec>;

pub fn frame_codec(max_frame_length: usize) -> LengthDelimitedCodec {
    length_delimited::Builder::new()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(max_frame_length)
        .new_codec()
}

pub fn framed<T: AsyncRead + AsyncWrite>(io: T, max_frame_length: usize) -> FramedStream<T> {
    Framed::new(io, frame_codec(max_frame_length))
}

/// Next frame body, or `None` when the peer closed cleanly between frames.
pub async fn read_frame<T>(framed: &mut FramedStream<T>) -> Result<Option<Bytes>>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    match framed.next().await {
        Some(Ok(frame)) => Ok(Some(frame.freeze())),
        Some(Err(e)) => Err(frame_error(e)),
        None => Ok(None),
    }
}

pub async fn write_frame<T>(framed: &mut FramedStream<T>, body: Bytes) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    framed.send(body).await.map_err(frame_error)
}

fn frame_error(e: std::io::Error) -> Error {
    match e.kind() {
        // Oversized frame, or EOF in the middle of one.
        std::io::ErrorKind::InvalidData | std::io::ErrorKind::Other => Error::Frame(e.to_string()),
        _ => Error::Io(e),
    }
}
