use futures::SinkExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::FramedWrite;
use uuid::Uuid;

use crate::buffer::{Args, StreamBuffer};
use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Result;

/// One client socket. Commands are reassembled from whatever the socket delivers and responses
/// are written back in full, one at a time.
pub struct Connection {
    pub id: Uuid,
    reader: OwnedReadHalf,
    writer: FramedWrite<OwnedWriteHalf, FrameCodec>,
    // Data is read from the socket into the stream buffer. When a command is extracted, the
    // corresponding data is removed from the buffer.
    buffer: StreamBuffer,
}

impl Connection {
    pub fn new(stream: TcpStream, max_buffer_size: usize) -> Connection {
        let (reader, writer) = stream.into_split();

        Connection {
            id: Uuid::new_v4(),
            reader,
            writer: FramedWrite::new(writer, FrameCodec),
            buffer: StreamBuffer::new(max_buffer_size),
        }
    }

    /// Reads the next command.
    ///
    /// Commands already buffered are returned before touching the socket again. `None` means the
    /// peer closed the connection between two commands; closing in the middle of one, sending
    /// malformed data or overflowing the buffer is an error.
    pub async fn read_command(&mut self) -> Result<Option<Args>> {
        loop {
            if let Some(args) = self.buffer.extract()? {
                return Ok(Some(args));
            }

            // `0` indicates "end of stream".
            if self.buffer.absorb_from(&mut self.reader).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err("connection reset by peer".into());
            }
        }
    }

    /// Writes a frame and flushes it to the socket.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<()> {
        self.writer.send(frame).await
    }
}
