use bytes::Bytes;

use crate::frame::Frame;
use crate::store::Store;

/// Returns PONG.
///
/// Ref: <https://redis.io/docs/latest/commands/ping>
pub fn ping(_store: &Store, _args: &[Bytes]) -> Frame {
    Frame::Simple("PONG".to_string())
}
