use bytes::Bytes;

use crate::commands::wrong_number_of_arguments;
use crate::frame::Frame;
use crate::store::Store;

/// Increments the number stored at key by one.
///
/// Ref: <https://redis.io/docs/latest/commands/incr/>
pub fn incr(store: &Store, args: &[Bytes]) -> Frame {
    let [_, key] = args else {
        return wrong_number_of_arguments();
    };

    match store.lock().incr_by(key, 1) {
        Ok(value) => Frame::Integer(value),
        Err(err) => Frame::Error(err.to_string()),
    }
}
