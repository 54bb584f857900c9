use bytes::Bytes;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;
use tokio::fs;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, error};

use crate::store::Store;

// Records are `key\nvalue\n`, raw bytes without escaping: a key or value holding a line feed
// can't be read back. Existing snapshot files depend on this layout.
const TERMINATOR: u8 = b'\n';

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("snapshot i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: incomplete snapshot")]
    Incomplete,
}

pub fn encode(pairs: &[(Bytes, Bytes)]) -> Vec<u8> {
    let size = pairs.iter().map(|(k, v)| k.len() + v.len() + 2).sum();
    let mut data = Vec::with_capacity(size);
    for (key, value) in pairs {
        data.extend_from_slice(key);
        data.push(TERMINATOR);
        data.extend_from_slice(value);
        data.push(TERMINATOR);
    }
    data
}

/// Splits the file into lines, pairing them up as key and value. A trailing CR on a line is
/// dropped and the last line doesn't need a terminator.
pub fn decode(data: &[u8]) -> Result<Vec<(Bytes, Bytes)>, Error> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let body = data.strip_suffix(&[TERMINATOR]).unwrap_or(data);
    let mut lines = body.split(|&byte| byte == TERMINATOR).map(|line| {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Bytes::copy_from_slice(line)
    });

    let mut pairs = Vec::new();
    while let Some(key) = lines.next() {
        let value = lines.next().ok_or(Error::Incomplete)?;
        pairs.push((key, value));
    }

    Ok(pairs)
}

/// Writes the pairs next to `path` first and renames the result over it, a crash never leaves a
/// half written snapshot behind.
pub async fn save(path: &Path, pairs: &[(Bytes, Bytes)]) -> Result<(), Error> {
    let tmp = tmp_path(path);
    fs::write(&tmp, encode(pairs)).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

pub async fn load(path: &Path) -> Result<Vec<(Bytes, Bytes)>, Error> {
    let data = fs::read(path).await?;
    decode(&data)
}

/// Copies the store and saves it, returning how many pairs were written.
pub async fn save_store(store: &Store, path: &Path) -> Result<usize, Error> {
    let pairs = store.snapshot();
    save(path, &pairs).await?;
    Ok(pairs.len())
}

/// Saves the store every `period` until the task is dropped. A failed save is logged and the
/// next tick tries again.
pub async fn run_periodic(store: Store, path: PathBuf, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;

        match save_store(&store, &path).await {
            Ok(count) => debug!(count, path = %path.display(), "Snapshot written"),
            Err(err) => error!(cause = %err, path = %path.display(), "Failed to write snapshot"),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
