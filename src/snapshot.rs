//! Persisted snapshot of the tree, block times and feed cursor.
//!
//! File layout:
//!
//! ```text
//! magic "SCS\0" | version u8 | payload length u64 LE | MessagePack payload | crc32 u32 LE
//! ```
//!
//! Snapshots are written to a temporary sibling file, synced and renamed over
//! the target. Writers hold an exclusive lock on a sibling `.lock` file.

use crate::error::{Result, StoreError};
use crate::tree::VersionedTree;
use crate::types::{BlockTimes, FeedCursor};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes for snapshot files.
const SNAPSHOT_MAGIC: &[u8; 4] = b"SCS\0";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u8 = 1;

/// Header size (magic + version + length).
const HEADER_SIZE: usize = 4 + 1 + 8;

/// Loaded snapshot contents.
#[derive(Debug, Default, Deserialize)]
pub struct Snapshot {
    pub tree: VersionedTree,
    pub cursor: Option<FeedCursor>,
    pub block_times: BlockTimes,
}

/// Borrowed view written by [`save`], so encoding never clones the tree.
#[derive(Serialize)]
pub struct SnapshotRef<'a> {
    pub tree: &'a VersionedTree,
    pub cursor: Option<FeedCursor>,
    pub block_times: &'a BlockTimes,
}

/// Encode a snapshot into its file representation.
pub fn encode(snapshot: &SnapshotRef<'_>) -> Result<Vec<u8>> {
    let payload = rmp_serde::to_vec(snapshot)?;
    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len() + 4);
    bytes.extend_from_slice(SNAPSHOT_MAGIC);
    bytes.push(SNAPSHOT_VERSION);
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&payload);
    bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(bytes)
}

/// Decode and verify a snapshot file's contents.
pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    if bytes.len() < HEADER_SIZE + 4 {
        return Err(StoreError::InvalidFormat("Snapshot too short".into()));
    }
    if &bytes[..4] != SNAPSHOT_MAGIC {
        return Err(StoreError::InvalidFormat("Invalid snapshot magic".into()));
    }
    if bytes[4] != SNAPSHOT_VERSION {
        return Err(StoreError::InvalidFormat(format!(
            "Unsupported snapshot version: {}",
            bytes[4]
        )));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[5..HEADER_SIZE]);
    let len = usize::try_from(u64::from_le_bytes(len_bytes))
        .map_err(|_| StoreError::InvalidFormat("Snapshot length overflow".into()))?;
    if bytes.len() - HEADER_SIZE - 4 != len {
        return Err(StoreError::InvalidFormat(format!(
            "Snapshot length mismatch: header says {len}, file has {}",
            bytes.len() - HEADER_SIZE - 4
        )));
    }

    let payload = &bytes[HEADER_SIZE..HEADER_SIZE + len];
    let mut checksum_bytes = [0u8; 4];
    checksum_bytes.copy_from_slice(&bytes[HEADER_SIZE + len..]);
    let expected = u32::from_le_bytes(checksum_bytes);
    let got = crc32fast::hash(payload);
    if expected != got {
        return Err(StoreError::ChecksumMismatch { expected, got });
    }

    Ok(rmp_serde::from_slice(payload)?)
}

/// Atomically replace the snapshot at `path`.
pub fn save(path: &Path, snapshot: &SnapshotRef<'_>) -> Result<()> {
    write(path, &encode(snapshot)?)
}

/// Atomically replace the snapshot at `path` with already encoded bytes.
pub fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let lock = acquire_lock(path)?;

    let tmp_path = sibling(path, ".tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp_path, path)?;

    lock.unlock()?;
    debug!(path = %path.display(), bytes = bytes.len(), "Snapshot written");
    Ok(())
}

/// Load and verify the snapshot at `path`.
pub fn load(path: &Path) -> Result<Snapshot> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    decode(&bytes)
}

fn acquire_lock(path: &Path) -> Result<File> {
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(sibling(path, ".lock"))?;

    lock_file
        .try_lock_exclusive()
        .map_err(|_| StoreError::Locked)?;

    Ok(lock_file)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
