use bytes::Bytes;

use crate::commands::wrong_number_of_arguments;
use crate::frame::Frame;
use crate::store::Store;

/// Set `key` to hold `value`, overwriting whatever was there.
///
/// Ref: <https://redis.io/docs/latest/commands/set>
pub fn set(store: &Store, args: &[Bytes]) -> Frame {
    let [_, key, value] = args else {
        return wrong_number_of_arguments();
    };

    store.lock().set(key.clone(), value.clone());

    Frame::Simple("OK".to_string())
}
