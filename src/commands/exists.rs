use bytes::Bytes;

use crate::commands::wrong_number_of_arguments;
use crate::frame::Frame;
use crate::store::Store;

/// Returns how many of the given keys exist. A key repeated in the arguments counts once per
/// mention.
///
/// Ref: <https://redis.io/docs/latest/commands/exists>
pub fn exists(store: &Store, args: &[Bytes]) -> Frame {
    let [_, keys @ ..] = args else {
        return wrong_number_of_arguments();
    };
    if keys.is_empty() {
        return wrong_number_of_arguments();
    }

    let store = store.lock();
    let count = keys.iter().filter(|key| store.exists(key)).count();

    Frame::Integer(count as i64)
}
