// src/storage.rs
// RocksDB-backed snapshot and journal persistence

use crate::events::JournalEntry;
use anyhow::{anyhow, Context, Result};
use rocksdb::{Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

/// Type alias for RocksDB (Arc for cheap cloning)
pub type RocksDb = Arc<DB>;

const SNAPSHOT_KEY: &str = "ledger:snapshot";
const JOURNAL_PREFIX: &str = "journal:";

/// Try to open RocksDB, retrying with backoff while another handle releases the lock
pub fn try_open_db(path: impl AsRef<Path>) -> Result<RocksDb> {
    let path = path.as_ref();
    let mut attempt = 0u32;
    let max_attempts = 8u32;
    let mut wait = 250u64;

    loop {
        match open_rocksdb_internal(path) {
            Ok(db) => return Ok(Arc::new(db)),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(anyhow!(
                        "Failed to open RocksDB at '{}' after {} attempts: {}",
                        path.display(),
                        attempt,
                        e
                    ));
                }
                log::warn!(
                    "open_db attempt {}/{} failed: {} - retrying in {}ms",
                    attempt,
                    max_attempts,
                    e,
                    wait
                );
                sleep(Duration::from_millis(wait));
                wait = std::cmp::min(wait * 2, 2000);
            }
        }
    }
}

fn open_rocksdb_internal(path: &Path) -> std::result::Result<DB, rocksdb::Error> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.set_max_background_jobs(2);
    opts.set_write_buffer_size(16 * 1024 * 1024); // 16MB
    opts.set_max_open_files(128);
    opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

    DB::open(&opts, path)
}

/// Get and deserialize a value stored under a string key.
pub fn get_str<T: DeserializeOwned>(db: &RocksDb, key: &str) -> Result<Option<T>> {
    match db
        .get(key.as_bytes())
        .with_context(|| format!("Failed to read {}", key))?
    {
        Some(bytes) => {
            let v = serde_json::from_slice::<T>(&bytes)
                .with_context(|| format!("Failed to decode {}", key))?;
            Ok(Some(v))
        }
        None => Ok(None),
    }
}

/// Iterate values whose keys start with the given prefix, in key order.
pub fn iter_prefix<T: DeserializeOwned>(db: &RocksDb, prefix: &str) -> Result<Vec<T>> {
    let prefix_bytes = prefix.as_bytes();
    let mut out = Vec::new();

    for item in db.prefix_iterator(prefix_bytes) {
        let (k, v) = item.context("Failed to iterate RocksDB")?;
        if !k.starts_with(prefix_bytes) {
            break;
        }
        let obj = serde_json::from_slice::<T>(&v).with_context(|| {
            format!("Failed to decode {}", String::from_utf8_lossy(&k))
        })?;
        out.push(obj);
    }
    Ok(out)
}

fn journal_key(seq: u64) -> String {
    // Zero-padded so lexicographic order matches sequence order
    format!("{}{:020}", JOURNAL_PREFIX, seq)
}

/// Ledger state store: one snapshot key plus an append-only journal
#[derive(Clone)]
pub struct LedgerStore {
    db: RocksDb,
}

impl LedgerStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = try_open_db(path)?;
        log::info!("Ledger store opened at {}", path.display());
        Ok(Self { db })
    }

    /// Write the snapshot and the journal entries it covers in one batch
    pub fn save<S: Serialize>(&self, snapshot: &S, entries: &[JournalEntry]) -> Result<()> {
        let mut batch = WriteBatch::default();
        let bytes = serde_json::to_vec(snapshot).context("Failed to encode ledger snapshot")?;
        batch.put(SNAPSHOT_KEY.as_bytes(), bytes);
        for entry in entries {
            let b = serde_json::to_vec(entry)
                .with_context(|| format!("Failed to encode journal entry {}", entry.seq))?;
            batch.put(journal_key(entry.seq).as_bytes(), b);
        }
        self.db
            .write(batch)
            .context("Failed to write ledger snapshot")?;
        Ok(())
    }

    pub fn load_snapshot<S: DeserializeOwned>(&self) -> Result<Option<S>> {
        get_str(&self.db, SNAPSHOT_KEY)
    }

    /// Every persisted journal entry, oldest first
    pub fn journal(&self) -> Result<Vec<JournalEntry>> {
        iter_prefix(&self.db, JOURNAL_PREFIX)
    }
}
