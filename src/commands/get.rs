use bytes::Bytes;

use crate::commands::wrong_number_of_arguments;
use crate::frame::Frame;
use crate::store::Store;

/// Get the value of `key`. A missing key is reported as an error reply rather than `nil`.
///
/// Ref: <https://redis.io/docs/latest/commands/get/>
pub fn get(store: &Store, args: &[Bytes]) -> Frame {
    let [_, key] = args else {
        return wrong_number_of_arguments();
    };

    match store.lock().get(key) {
        Some(value) => Frame::Bulk(value),
        None => Frame::Error("doesn't exist".to_string()),
    }
}
