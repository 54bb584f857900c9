use bytes::Bytes;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("value is not an integer or out of range")]
    NotAnInteger,
}

/// The Store holds every key-value pair of the server.
///
/// It is created once at startup and shared by every connection and by the snapshot task, cloning
/// it is cheap since the state lives behind reference counting. Every operation runs while holding
/// the store lock, so a read-modify-write such as [`InnerStoreLocked::incr_by`] can't interleave
/// with a concurrent write on the same key.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn new() -> Store {
        let inner = Arc::new(InnerStore {
            state: Mutex::new(State {
                keys: HashMap::new(),
            }),
        });

        Self { inner }
    }

    /// Point-in-time copy of every pair. The lock is held only while copying.
    pub fn snapshot(&self) -> Vec<(Bytes, Bytes)> {
        self.lock()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Bulk load used at startup. Existing keys are overwritten.
    pub fn restore(&self, pairs: impl IntoIterator<Item = (Bytes, Bytes)>) {
        let mut store = self.lock();
        for (key, value) in pairs {
            store.set(key, value);
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InnerStore {
    state: Mutex<State>,
}

pub struct InnerStoreLocked<'a> {
    state: MutexGuard<'a, State>,
}

impl<'a> InnerStoreLocked<'a> {
    pub fn set(&mut self, key: Bytes, data: Bytes) {
        self.state.keys.insert(key, data);
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.state.keys.get(key).cloned()
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Bytes> {
        self.state.keys.remove(key)
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.state.keys.contains_key(key)
    }

    pub fn size(&self) -> usize {
        self.state.keys.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Bytes)> {
        self.state.keys.iter()
    }

    /// Adds `increment` to the integer stored at `key`, a missing key counts as zero.
    ///
    /// The key is left untouched when its value isn't a base-10 `i64` or the result overflows.
    pub fn incr_by(&mut self, key: &[u8], increment: i64) -> Result<i64, Error> {
        let current = match self.state.keys.get(key) {
            Some(value) => std::str::from_utf8(value)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(Error::NotAnInteger)?,
            None => 0,
        };

        let value = current.checked_add(increment).ok_or(Error::NotAnInteger)?;
        self.set(Bytes::copy_from_slice(key), Bytes::from(value.to_string()));

        Ok(value)
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl InnerStore {
    pub fn lock(&self) -> InnerStoreLocked<'_> {
        // A panic while holding the lock can't leave the map half written, keep serving it.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        InnerStoreLocked { state }
    }
}

type Key = Bytes;

type Value = Bytes;

struct State {
    keys: HashMap<Key, Value>,
}
