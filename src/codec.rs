use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::frame::Frame;
use crate::Error;

/// Writes response frames into a `FramedWrite` sink.
pub struct FrameCodec;

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&Vec::<u8>::from(frame));
        Ok(())
    }
}
