//! RocksDB storage backend for the Trust Hub ledger.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, DB};
use std::path::Path;
use std::sync::Mutex;

use trusthub_agents::ledger::record_key;
use trusthub_agents::{LedgerError, LedgerRecord, LedgerStore, PutOutcome};

/// Column family holding ledger records, keyed `<tenant>/<record_id>`.
const CF_LEDGER: &str = "ledger";

/// RocksDB-backed storage for the Trust Hub node.
pub struct Storage {
    db: DB,
    /// Serializes the read-compare-write in `put_record`.
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open or create the database, creating the ledger column family if needed.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(CF_LEDGER, Options::default())];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| anyhow::anyhow!("missing column family {name}"))
    }

    pub fn put_raw(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        Ok(self.db.put_cf(self.cf(cf_name)?, key, value)?)
    }

    pub fn get_raw(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get_cf(self.cf(cf_name)?, key)?)
    }

    pub fn delete_raw(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        Ok(self.db.delete_cf(self.cf(cf_name)?, key)?)
    }

    /// Read a live ledger record. Expired records awaiting purge read as absent.
    pub fn get_record(&self, tenant_id: &str, record_id: &str) -> Result<Option<LedgerRecord>> {
        let key = record_key(tenant_id, record_id);
        let Some(bytes) = self.get_raw(CF_LEDGER, key.as_bytes())? else {
            return Ok(None);
        };
        let record: LedgerRecord = serde_json::from_slice(&bytes)?;
        Ok((!record.is_expired(Utc::now())).then_some(record))
    }

    /// Write a ledger record unless a live one already exists under its key.
    pub fn put_record(&self, record: &LedgerRecord) -> Result<PutOutcome, LedgerError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| LedgerError::Backend("ledger write lock poisoned".into()))?;

        if let Some(existing) = self
            .get_record(&record.tenant_id, &record.record_id)
            .map_err(backend)?
        {
            if existing.same_content(record) {
                return Ok(PutOutcome::Duplicate);
            }
            return Err(LedgerError::Conflict {
                tenant_id: record.tenant_id.clone(),
                record_id: record.record_id.clone(),
            });
        }

        let bytes = serde_json::to_vec(record)?;
        self.put_raw(CF_LEDGER, record.key().as_bytes(), &bytes)
            .map_err(backend)?;
        Ok(PutOutcome::Written)
    }

    /// Delete every record whose expiry is at or before `now`.
    pub fn purge_records(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut expired = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_LEDGER)?, IteratorMode::Start) {
            let (key, value) = item?;
            match serde_json::from_slice::<LedgerRecord>(&value) {
                Ok(record) if record.is_expired(now) => expired.push(key),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "skipping undecodable ledger record"
                    );
                }
            }
        }

        for key in &expired {
            self.delete_raw(CF_LEDGER, key)?;
        }
        Ok(expired.len())
    }
}

fn backend(e: anyhow::Error) -> LedgerError {
    LedgerError::Backend(e.to_string())
}

#[async_trait]
impl LedgerStore for Storage {
    async fn put(&self, record: &LedgerRecord) -> Result<PutOutcome, LedgerError> {
        self.put_record(record)
    }

    async fn get(
        &self,
        tenant_id: &str,
        record_id: &str,
    ) -> Result<Option<LedgerRecord>, LedgerError> {
        self.get_record(tenant_id, record_id).map_err(backend)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, LedgerError> {
        let purged = self.purge_records(now).map_err(backend)?;
        if purged > 0 {
            tracing::info!(purged, "expired ledger records removed");
        }
        Ok(purged)
    }
}
