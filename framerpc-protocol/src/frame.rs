//! Binary frame format.
//!
//! Frame layout (12 bytes header + payload, all integers big-endian):
//!
//! ```text
//! +------------+-------------+-------------+---------------------+
//! |   magic    | sequence_id | payload_len | payload             |
//! |  4 bytes   |   4 bytes   |   4 bytes   | payload_len bytes   |
//! +------------+-------------+-------------+---------------------+
//! ```
//!
//! There is no version field and no checksum. A frame whose magic does not
//! match [`MAGIC`] cannot be skipped: the stream offers no way to find the
//! next frame boundary, so callers must drop the connection.
//!
//! No payload size limit is applied unless the caller asks for one through
//! [`read_frame_with_limit`].

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Magic number opening every frame.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Size of the fixed frame header in bytes (4+4+4 = 12).
pub const FRAME_HEADER_SIZE: usize = 12;

/// A single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence id chosen by the requester and echoed in the reply.
    pub sequence_id: u32,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame.
    pub fn new(sequence_id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence_id,
            payload: payload.into(),
        }
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        encode_frame(self.sequence_id, &self.payload)
    }

    /// Decodes a frame from a buffer.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on a bad magic number.
    /// Nothing is consumed from `buf` unless a whole frame is available.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let mut header = &buf[..FRAME_HEADER_SIZE];
        let magic = header.get_u32();
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }
        let sequence_id = header.get_u32();
        let payload_len = header.get_u32() as usize;

        if buf.len() < FRAME_HEADER_SIZE + payload_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(payload_len).freeze();

        Ok(Some(Self {
            sequence_id,
            payload,
        }))
    }
}

/// Encodes `payload` into a frame tagged with `sequence_id`.
///
/// Fails only when the payload length does not fit in the 32-bit length field.
pub fn encode_frame(sequence_id: u32, payload: &[u8]) -> Result<BytesMut, ProtocolError> {
    let payload_len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge {
        size: payload.len() as u64,
        max: u64::from(u32::MAX),
    })?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_u32(MAGIC);
    buf.put_u32(sequence_id);
    buf.put_u32(payload_len);
    buf.put_slice(payload);

    Ok(buf)
}

/// Reads exactly one frame from `reader`.
///
/// Blocks until the full header and payload have arrived. A stream that ends
/// before the first header byte yields [`ProtocolError::ConnectionClosed`];
/// one that ends mid-header or mid-payload yields
/// [`ProtocolError::HeaderRead`] or [`ProtocolError::PayloadRead`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_frame_with_limit(reader, None).await
}

/// Like [`read_frame`], but rejects frames declaring a payload larger than
/// `max_payload` before allocating for them.
pub async fn read_frame_with_limit<R>(
    reader: &mut R,
    max_payload: Option<u32>,
) -> Result<Frame, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    read_header(reader, &mut header).await?;

    let mut cursor = &header[..];
    let magic = cursor.get_u32();
    if magic != MAGIC {
        return Err(ProtocolError::InvalidMagic(magic));
    }
    let sequence_id = cursor.get_u32();
    let payload_len = cursor.get_u32();

    if let Some(max) = max_payload {
        if payload_len > max {
            return Err(ProtocolError::FrameTooLarge {
                size: u64::from(payload_len),
                max: u64::from(max),
            });
        }
    }

    let mut payload = vec![0u8; payload_len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(ProtocolError::PayloadRead)?;

    Ok(Frame {
        sequence_id,
        payload: Bytes::from(payload),
    })
}

/// Fills `header`, telling a clean end of stream apart from a truncated header.
async fn read_header<R>(
    reader: &mut R,
    header: &mut [u8; FRAME_HEADER_SIZE],
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        let n = reader
            .read(&mut header[filled..])
            .await
            .map_err(ProtocolError::HeaderRead)?;
        if n == 0 {
            if filled == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }
            return Err(ProtocolError::HeaderRead(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "stream ended after {} of {} header bytes",
                    filled, FRAME_HEADER_SIZE
                ),
            )));
        }
        filled += n;
    }
    Ok(())
}

/// Encodes and writes one frame, then flushes the writer.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let encoded = frame.encode()?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
