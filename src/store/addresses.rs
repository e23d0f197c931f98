use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::dne::record::AddressDocument;
use crate::store::rocks::KvStore;

/// Read/write access to the persisted address documents.
///
/// Every key has the exact form `cep:` followed by 8 ASCII digits; values
/// are the UTF-8 JSON encoding of [`AddressDocument`].
#[derive(Debug, Clone)]
pub struct AddressStore {
    kv: KvStore,
}

impl AddressStore {
    const ADDRESSES_CF: &'static str = "addresses";
    pub const KEY_PREFIX: &'static str = "cep:";

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let kv = KvStore::open(path, Self::ADDRESSES_CF)?;
        Ok(Self { kv })
    }

    pub fn key_for(cep: &str) -> Vec<u8> {
        format!("{}{cep}", Self::KEY_PREFIX).into_bytes()
    }

    /// Serializes a document into its (key, value) entry form for batching.
    pub fn entry_for(document: &AddressDocument) -> serde_json::Result<(Vec<u8>, Vec<u8>)> {
        let value = serde_json::to_vec(document)?;
        Ok((Self::key_for(&document.cep), value))
    }

    pub fn get(&self, cep: &str) -> Result<Option<AddressDocument>> {
        let Some(raw) = self.kv.get(Self::ADDRESSES_CF, &Self::key_for(cep))? else {
            return Ok(None);
        };
        let document =
            serde_json::from_slice(&raw).context("Stored address document is not valid JSON")?;
        Ok(Some(document))
    }

    pub fn write_batch(&self, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        self.kv.put_batch(Self::ADDRESSES_CF, entries)
    }

    pub fn flush(&self) -> Result<()> {
        self.kv.flush(Self::ADDRESSES_CF)
    }

    /// Up to `limit` documents whose CEP starts with `cep_prefix`, in key
    /// order. An undecodable value is logged and skipped.
    pub fn list(&self, cep_prefix: &str, limit: usize) -> Result<Vec<AddressDocument>> {
        let prefix = format!("{}{cep_prefix}", Self::KEY_PREFIX).into_bytes();
        let mut documents = Vec::new();
        self.kv.scan_prefix(Self::ADDRESSES_CF, &prefix, |key, value| {
            if documents.len() >= limit {
                return false;
            }
            match serde_json::from_slice::<AddressDocument>(value) {
                Ok(document) => documents.push(document),
                Err(err) => {
                    warn!(key = %String::from_utf8_lossy(key), %err, "skipping undecodable document");
                }
            }
            true
        })?;
        Ok(documents)
    }

    pub fn count(&self) -> Result<u64> {
        let mut count = 0u64;
        self.kv
            .scan_prefix(Self::ADDRESSES_CF, Self::KEY_PREFIX.as_bytes(), |_, _| {
                count += 1;
                true
            })?;
        Ok(count)
    }

    /// Full-scan aggregation for the stats endpoint: total documents plus a
    /// per-UF breakdown. Documents without a UF land under an empty key.
    pub fn uf_breakdown(&self) -> Result<(u64, BTreeMap<String, u64>)> {
        let mut total = 0u64;
        let mut by_uf: BTreeMap<String, u64> = BTreeMap::new();
        self.kv
            .scan_prefix(Self::ADDRESSES_CF, Self::KEY_PREFIX.as_bytes(), |key, value| {
                match serde_json::from_slice::<AddressDocument>(value) {
                    Ok(document) => {
                        total += 1;
                        *by_uf.entry(document.uf).or_default() += 1;
                    }
                    Err(err) => {
                        warn!(key = %String::from_utf8_lossy(key), %err, "skipping undecodable document");
                    }
                }
                true
            })?;
        Ok((total, by_uf))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::dne::record::Origin;

    use super::*;

    fn document(cep: &str, uf: &str) -> AddressDocument {
        AddressDocument {
            cep: cep.to_string(),
            logradouro: "Avenida Paulista".to_string(),
            complemento: String::new(),
            bairro: String::new(),
            cidade: "São Paulo".to_string(),
            uf: uf.to_string(),
            codigo_ibge: String::new(),
            tipo_logradouro: "Avenida".to_string(),
            tipo_origem: Origin::Street,
            nome_origem: String::new(),
        }
    }

    fn create_test_store() -> (AddressStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = AddressStore::open(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_write_and_get_round_trip() {
        let (store, _temp_dir) = create_test_store();

        let doc = document("01310100", "SP");
        let entry = AddressStore::entry_for(&doc).unwrap();
        store.write_batch(&[entry]).unwrap();

        let fetched = store.get("01310100").unwrap().unwrap();
        assert_eq!(fetched, doc);
        assert!(store.get("99999999").unwrap().is_none());
    }

    #[test]
    fn test_key_shape() {
        assert_eq!(AddressStore::key_for("01310100"), b"cep:01310100".to_vec());
    }

    #[test]
    fn test_list_respects_prefix_and_limit() {
        let (store, _temp_dir) = create_test_store();

        let entries: Vec<_> = ["01000000", "01310100", "20000000"]
            .iter()
            .map(|cep| AddressStore::entry_for(&document(cep, "SP")).unwrap())
            .collect();
        store.write_batch(&entries).unwrap();

        let page = store.list("01", 10).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].cep, "01000000");
        assert_eq!(page[1].cep, "01310100");

        let limited = store.list("", 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_count_and_uf_breakdown() {
        let (store, _temp_dir) = create_test_store();

        let entries = vec![
            AddressStore::entry_for(&document("01310100", "SP")).unwrap(),
            AddressStore::entry_for(&document("20000000", "RJ")).unwrap(),
            AddressStore::entry_for(&document("20010000", "RJ")).unwrap(),
        ];
        store.write_batch(&entries).unwrap();

        assert_eq!(store.count().unwrap(), 3);

        let (total, by_uf) = store.uf_breakdown().unwrap();
        assert_eq!(total, 3);
        assert_eq!(by_uf.get("SP"), Some(&1));
        assert_eq!(by_uf.get("RJ"), Some(&2));
    }
}
