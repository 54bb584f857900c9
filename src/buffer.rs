use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error as ThisError;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::frame::{self, Frame};

const READ_CHUNK_SIZE: usize = 8192;

/// One client command: the command name followed by its arguments.
pub type Args = Vec<Bytes>;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("buffer overflow; retained data would exceed {limit} bytes")]
    Overflow { limit: usize },
    #[error(transparent)]
    Malformed(frame::Error),
}

/// Per connection accumulator that turns a TCP byte stream into commands.
///
/// Bytes are appended at the tail with [`StreamBuffer::absorb`] and whole commands are removed
/// from the head with [`StreamBuffer::extract`]. Whatever belongs to a frame that has not fully
/// arrived yet stays in place, contiguous, until the next `absorb`.
#[derive(Debug)]
pub struct StreamBuffer {
    // Consumed bytes are released with `advance`, `BytesMut` keeps track of the read position and
    // reclaims the space when it needs to grow.
    buffer: BytesMut,
    max_size: usize,
}

impl StreamBuffer {
    pub fn new(max_size: usize) -> StreamBuffer {
        StreamBuffer {
            // Allocate the buffer with 4kb of capacity, it grows on demand up to `max_size`.
            buffer: BytesMut::with_capacity(4096.min(max_size)),
            max_size,
        }
    }

    pub fn absorb(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.buffer.len() + bytes.len() > self.max_size {
            return Err(Error::Overflow {
                limit: self.max_size,
            });
        }

        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Reads from `reader` straight into the buffer, never past `max_size`.
    ///
    /// Returns the number of bytes read, `0` meaning end of stream. Reading into a full buffer is
    /// an `Overflow`: the pending frame can no longer complete.
    pub async fn absorb_from<R>(&mut self, reader: &mut R) -> Result<usize, crate::Error>
    where
        R: AsyncRead + Unpin,
    {
        let room = self.max_size.saturating_sub(self.buffer.len());
        if room == 0 {
            return Err(Error::Overflow {
                limit: self.max_size,
            }
            .into());
        }

        self.buffer.reserve(room.min(READ_CHUNK_SIZE));
        let n = reader.take(room as u64).read_buf(&mut self.buffer).await?;

        Ok(n)
    }

    /// Removes the next complete command from the buffer.
    ///
    /// Returns `Ok(None)` when more data is needed, leaving the buffer untouched. Bytes in front of
    /// the first recognised type tag are noise and are dropped together with the command.
    pub fn extract(&mut self) -> Result<Option<Args>, Error> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let start = self
            .buffer
            .iter()
            .position(|&byte| frame::is_command_tag(byte))
            .ok_or_else(|| Error::Malformed(frame::Error::InvalidDataType(self.buffer[0])))?;

        let (frame, consumed) = match frame::decode(&self.buffer, start) {
            Ok(decoded) => decoded,
            Err(frame::Error::Incomplete) => return Ok(None),
            Err(err) => return Err(Error::Malformed(err)),
        };

        self.buffer.advance(start + consumed);

        Ok(Some(into_args(frame)))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn into_args(frame: Frame) -> Args {
    let mut args = Vec::new();
    match frame {
        Frame::Array(frames) => {
            for frame in frames {
                flatten_into(frame, &mut args);
            }
        }
        frame => flatten_into(frame, &mut args),
    }
    args
}

fn flatten_into(frame: Frame, args: &mut Args) {
    match frame {
        Frame::Bulk(bytes) => args.push(bytes),
        Frame::Simple(s) | Frame::Error(s) => args.push(Bytes::from(s)),
        Frame::Integer(i) => args.push(Bytes::from(i.to_string())),
        Frame::Null => args.push(Bytes::new()),
        Frame::NullArray => {}
        Frame::Array(frames) => {
            for frame in frames {
                flatten_into(frame, args);
            }
        }
    }
}
