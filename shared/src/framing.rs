//! Length-prefixed framing for stream transports.
//!
//! ```text
//! +-------------------+--------------------+
//! | length (2 bytes)  |   payload          |
//! | u16 big-endian    |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The length does not include the prefix. A zero length frame is a
//! keepalive. Payloads larger than [`MAX_MESSAGE_SIZE`] are rejected on both
//! read and write. Websocket connections skip this layer and carry one
//! payload per binary message.

use crate::MAX_MESSAGE_SIZE;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// The peer closed the stream before a complete frame arrived.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn map_eof(e: std::io::Error) -> FrameError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(e)
    }
}

/// Reads one frame and returns its payload (empty for keepalives).
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 2];
    reader.read_exact(&mut len_buf).await.map_err(map_eof)?;

    let payload_len = usize::from(u16::from_be_bytes(len_buf));
    if payload_len > MAX_MESSAGE_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload).await.map_err(map_eof)?;
    }

    Ok(payload)
}

/// Writes one frame and flushes it.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), FrameError> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    // Bounded by MAX_MESSAGE_SIZE above, so the cast cannot truncate.
    let len = payload.len() as u16;
    writer.write_all(&len.to_be_bytes()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;

    Ok(())
}
