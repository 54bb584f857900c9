use bytes::Bytes;

use crate::commands::wrong_number_of_arguments;
use crate::frame::Frame;
use crate::store::Store;

// https://redis.io/commands/del
pub fn del(store: &Store, args: &[Bytes]) -> Frame {
    let [_, keys @ ..] = args else {
        return wrong_number_of_arguments();
    };
    if keys.is_empty() {
        return wrong_number_of_arguments();
    }

    let mut count = 0;
    let mut store = store.lock();
    for key in keys {
        if store.remove(key).is_some() {
            count += 1;
        }
    }

    Frame::Integer(count)
}
