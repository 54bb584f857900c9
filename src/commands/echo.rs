use bytes::Bytes;

use crate::commands::wrong_number_of_arguments;
use crate::frame::Frame;
use crate::store::Store;

/// Returns the message as a bulk string, byte for byte.
///
/// Ref: <https://redis.io/docs/latest/commands/echo>
pub fn echo(_store: &Store, args: &[Bytes]) -> Frame {
    let [_, message] = args else {
        return wrong_number_of_arguments();
    };

    Frame::Bulk(message.clone())
}
