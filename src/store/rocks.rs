use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rocksdb::{
    BlockBasedOptions, BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction,
    IteratorMode, MultiThreaded, Options, WriteBatch, WriteOptions,
};

/// Thin wrapper around a RocksDB handle scoped to a single column family.
/// Offers the primitives the service needs: point-get, prefix scan, and
/// bounded write batches with an explicit flush.
#[derive(Debug, Clone)]
pub struct KvStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    path: PathBuf,
}

fn store_options() -> Options {
    let num_threads = std::cmp::max(2, num_cpus::get());

    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);

    // The read side is point lookups by full key; bloom filters skip most
    // SST probes on a miss.
    let mut block_opts = BlockBasedOptions::default();
    block_opts.set_bloom_filter(10.0, false);
    block_opts.set_cache_index_and_filter_blocks(true);
    block_opts.set_pin_l0_filter_and_index_blocks_in_cache(true);
    opts.set_block_based_table_factory(&block_opts);

    opts.set_write_buffer_size(32 * 1024 * 1024);
    opts.set_max_write_buffer_number(2);
    opts.set_target_file_size_base(64 * 1024 * 1024);

    opts.increase_parallelism(num_threads as i32);
    opts.set_max_open_files(256);

    opts
}

impl KvStore {
    pub fn open<P: AsRef<Path>>(path: P, cf_name: &str) -> Result<Self> {
        let path_ref = path.as_ref();
        let opts = store_options();
        let descriptors = vec![ColumnFamilyDescriptor::new(cf_name, Options::default())];

        let db =
            DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, path_ref, descriptors)
                .context("Failed to open RocksDB")?;

        Ok(Self {
            db: Arc::new(db),
            path: path_ref.to_path_buf(),
        })
    }

    fn cf_handle(&self, cf_name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(cf_name)
            .context("Column family not found")
    }

    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .context("Failed to get key from RocksDB")
    }

    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf_handle(cf_name)?;
        self.db.put_cf(&cf, key, value).context("Failed to put key")
    }

    pub fn put_batch(&self, cf_name: &str, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        let cf = self.cf_handle(cf_name)?;
        let mut batch = WriteBatch::default();
        for (key, value) in entries {
            batch.put_cf(&cf, key, value);
        }
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(false);
        self.db
            .write_opt(batch, &write_opts)
            .context("Failed to put batch")
    }

    /// Visits keys starting with `prefix` in key order. The callback returns
    /// `false` to stop early.
    pub fn scan_prefix<F>(&self, cf_name: &str, prefix: &[u8], mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let cf = self.cf_handle(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.context("Failed to read during prefix scan")?;
            if !key.starts_with(prefix) {
                break;
            }
            if !visit(&key, &value) {
                break;
            }
        }
        Ok(())
    }

    pub fn flush(&self, cf_name: &str) -> Result<()> {
        let mut flush_opts = rocksdb::FlushOptions::default();
        flush_opts.set_wait(true);
        let cf = self.cf_handle(cf_name)?;
        self.db
            .flush_cf_opt(&cf, &flush_opts)
            .context("Failed to flush")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const TEST_CF: &str = "test_cf";

    fn create_test_store() -> (KvStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = KvStore::open(temp_dir.path(), TEST_CF).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_put_and_get() {
        let (store, _temp_dir) = create_test_store();

        store.put(TEST_CF, b"key1", b"value1").unwrap();
        assert_eq!(store.get(TEST_CF, b"key1").unwrap().unwrap(), b"value1");
        assert!(store.get(TEST_CF, b"missing").unwrap().is_none());
    }

    #[test]
    fn test_put_batch() {
        let (store, _temp_dir) = create_test_store();

        let entries = vec![
            (b"key1".to_vec(), b"value1".to_vec()),
            (b"key2".to_vec(), b"value2".to_vec()),
            (b"key3".to_vec(), b"value3".to_vec()),
        ];
        store.put_batch(TEST_CF, &entries).unwrap();

        for (key, value) in &entries {
            assert_eq!(store.get(TEST_CF, key).unwrap().unwrap(), *value);
        }
    }

    #[test]
    fn test_empty_put_batch() {
        let (store, _temp_dir) = create_test_store();
        store.put_batch(TEST_CF, &[]).unwrap();
    }

    #[test]
    fn test_scan_prefix_stays_in_bounds() {
        let (store, _temp_dir) = create_test_store();

        store.put(TEST_CF, b"cep:01000000", b"a").unwrap();
        store.put(TEST_CF, b"cep:01310100", b"b").unwrap();
        store.put(TEST_CF, b"cep:20000000", b"c").unwrap();
        store.put(TEST_CF, b"other:x", b"d").unwrap();

        let mut keys = Vec::new();
        store
            .scan_prefix(TEST_CF, b"cep:01", |key, _| {
                keys.push(key.to_vec());
                true
            })
            .unwrap();

        assert_eq!(keys, vec![b"cep:01000000".to_vec(), b"cep:01310100".to_vec()]);
    }

    #[test]
    fn test_scan_prefix_early_stop() {
        let (store, _temp_dir) = create_test_store();

        store.put(TEST_CF, b"cep:01000000", b"a").unwrap();
        store.put(TEST_CF, b"cep:01310100", b"b").unwrap();

        let mut visited = 0;
        store
            .scan_prefix(TEST_CF, b"cep:", |_, _| {
                visited += 1;
                false
            })
            .unwrap();
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_invalid_column_family() {
        let (store, _temp_dir) = create_test_store();

        let result = store.put("nonexistent_cf", b"key", b"value");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Column family not found"));
    }

    #[test]
    fn test_flush_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = KvStore::open(temp_dir.path(), TEST_CF).unwrap();
            store.put(TEST_CF, b"key1", b"value1").unwrap();
            store.flush(TEST_CF).unwrap();
        }
        let reopened = KvStore::open(temp_dir.path(), TEST_CF).unwrap();
        assert_eq!(reopened.get(TEST_CF, b"key1").unwrap().unwrap(), b"value1");
    }
}
