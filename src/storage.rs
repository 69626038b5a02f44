//! RocksDB storage layer
//!
//! Thin wrapper around a tuned RocksDB instance. Typed persistence,
//! key templates and atomicity live one level up in [`crate::store`].

use crate::config::{CompressionType, StorageConfig};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

/// Point-lookup-optimized storage shared across the engine and API.
#[derive(Clone)]
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open storage at `path` with default settings.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rocksdb::Error> {
        let config = StorageConfig {
            data_directory: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        };
        Self::open_with_config(&config)
    }

    /// Open storage with explicit configuration.
    pub fn open_with_config(config: &StorageConfig) -> Result<Self, rocksdb::Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(config.max_write_buffer_number as i32);

        let compression = match config.compression_type {
            CompressionType::None => rocksdb::DBCompressionType::None,
            CompressionType::Snappy => rocksdb::DBCompressionType::Snappy,
            CompressionType::Lz4 => rocksdb::DBCompressionType::Lz4,
            CompressionType::Zstd => rocksdb::DBCompressionType::Zstd,
        };
        opts.set_compression_type(compression);

        // Wallet and session reads dominate; size the point-lookup cache for them.
        opts.set_level_compaction_dynamic_level_bytes(true);
        opts.optimize_for_point_lookup(1024);

        let db = DB::open(&opts, &config.data_directory)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, rocksdb::Error> {
        self.db.get(key)
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), rocksdb::Error> {
        self.db.put(key, value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), rocksdb::Error> {
        self.db.delete(key)
    }

    /// Delete multiple keys in one batch.
    pub fn delete_batch<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<(), rocksdb::Error> {
        let mut batch = WriteBatch::default();
        for key in keys {
            batch.delete(key);
        }
        self.db.write(batch)
    }

    /// Scan keys with the given prefix in lexicographic order, up to `limit`.
    pub fn scan_prefix(&self, prefix: &[u8], limit: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();

        for item in self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward))
        {
            let Ok((key, value)) = item else {
                continue;
            };

            if !key.as_ref().starts_with(prefix) {
                break;
            }

            out.push((key.to_vec(), value.to_vec()));
            if out.len() >= limit {
                break;
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch(name: &str) -> Storage {
        let path = format!("./DB/test_storage_{}", name);
        let _ = fs::remove_dir_all(&path);
        Storage::open(&path).expect("open storage")
    }

    #[test]
    fn test_put_get_delete() {
        let storage = scratch("put_get");

        storage.put(b"k1", b"v1").unwrap();
        assert_eq!(storage.get(b"k1").unwrap(), Some(b"v1".to_vec()));

        storage.delete(b"k1").unwrap();
        assert_eq!(storage.get(b"k1").unwrap(), None);
    }

    #[test]
    fn test_scan_prefix_ordering_and_bounds() {
        let storage = scratch("scan");

        storage.put(b"idx:0002:b", b"2").unwrap();
        storage.put(b"idx:0001:a", b"1").unwrap();
        storage.put(b"idx:0003:c", b"3").unwrap();
        storage.put(b"other:x", b"x").unwrap();

        let hits = storage.scan_prefix(b"idx:", 10);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0, b"idx:0001:a".to_vec());
        assert_eq!(hits[2].0, b"idx:0003:c".to_vec());

        let limited = storage.scan_prefix(b"idx:", 2);
        assert_eq!(limited.len(), 2);
    }
}
