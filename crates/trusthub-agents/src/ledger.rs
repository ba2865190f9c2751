//! Audit ledger.
//!
//! One record per attestation or authorization transaction, partitioned by
//! tenant. Records are written once and never updated; they expire after a
//! TTL and are removed by [`LedgerStore::purge_expired`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trusthub_core::{timestamp, CanonicalBytes, ClaimMap, CoreError};
use trusthub_crypto::digest_hex;
use uuid::Uuid;

/// Default retention for ledger records.
pub const DEFAULT_TTL_DAYS: i64 = 90;

pub fn default_ttl() -> Duration {
    Duration::days(DEFAULT_TTL_DAYS)
}

/// Deterministic record id for a client-supplied request id.
///
/// Each method hashes into its own UUID namespace, and the tenant id is
/// length-prefixed so no `(tenant, request)` pair can spell another.
pub fn transaction_id(method: &str, tenant_id: &str, request_id: &str) -> String {
    let namespace = Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("trusthub:{method}").as_bytes());
    let name = format!("{}:{tenant_id}/{request_id}", tenant_id.len());
    format!("urn:uuid:{}", Uuid::new_v5(&namespace, name.as_bytes()))
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("record {tenant_id}/{record_id} already exists with different content")]
    Conflict { tenant_id: String, record_id: String },

    #[error("ledger backend error: {0}")]
    Backend(String),

    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of a successful `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    /// An identical record was already present; nothing was written.
    Duplicate,
}

/// What was submitted, without the submitted values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSummary {
    /// Top-level claim names, sorted.
    pub fields: Vec<String>,
    /// BLAKE3 digest of the canonical input.
    pub digest: String,
}

impl InputSummary {
    pub fn of(claims: &ClaimMap) -> Result<Self, CoreError> {
        let mut fields: Vec<String> = claims.keys().cloned().collect();
        fields.sort();
        let canonical = CanonicalBytes::new(claims)?;
        Ok(Self {
            fields,
            digest: digest_hex(canonical.as_bytes()),
        })
    }

    /// Summary of claims submitted together with a context object.
    ///
    /// `fields` lists the claim names only; the digest covers both parts.
    pub fn with_context(claims: &ClaimMap, context: &Value) -> Result<Self, CoreError> {
        let mut whole = ClaimMap::new();
        whole.insert("claims".into(), Value::Object(claims.clone()));
        whole.insert("context".into(), context.clone());
        let digest = Self::of(&whole)?.digest;
        let mut fields: Vec<String> = claims.keys().cloned().collect();
        fields.sort();
        Ok(Self { fields, digest })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub tenant_id: String,
    pub record_id: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub input_summary: InputSummary,
    pub outcome: String,
    pub payload: Value,
    #[serde(with = "timestamp")]
    pub expires_at: DateTime<Utc>,
}

impl LedgerRecord {
    pub fn new(
        tenant_id: impl Into<String>,
        record_id: impl Into<String>,
        method: impl Into<String>,
        input_summary: InputSummary,
        outcome: impl Into<String>,
        payload: Value,
        ttl: Duration,
    ) -> Self {
        let now = timestamp::now();
        Self {
            tenant_id: tenant_id.into(),
            record_id: record_id.into(),
            timestamp: now,
            method: method.into(),
            input_summary,
            outcome: outcome.into(),
            payload,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Same transaction result, ignoring when it was written.
    pub fn same_content(&self, other: &LedgerRecord) -> bool {
        self.method == other.method
            && self.outcome == other.outcome
            && self.payload == other.payload
            && self.input_summary == other.input_summary
    }

    /// Whether this record was written for `method` with the same input.
    pub fn answers(&self, method: &str, input: &InputSummary) -> bool {
        self.method == method && self.input_summary.digest == input.digest
    }

    /// Storage key, `<tenant>/<record_id>`.
    pub fn key(&self) -> String {
        record_key(&self.tenant_id, &self.record_id)
    }
}

pub fn record_key(tenant_id: &str, record_id: &str) -> String {
    format!("{tenant_id}/{record_id}")
}

/// Append-only record store.
///
/// `put` of an existing key succeeds as [`PutOutcome::Duplicate`] only when
/// the content is identical; anything else is a [`LedgerError::Conflict`].
/// Expired records are invisible to `get` and may be overwritten by `put`
/// before the purge task removes them.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn put(&self, record: &LedgerRecord) -> Result<PutOutcome, LedgerError>;

    async fn get(
        &self,
        tenant_id: &str,
        record_id: &str,
    ) -> Result<Option<LedgerRecord>, LedgerError>;

    /// Remove records whose `expires_at` is at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, LedgerError>;
}

/// Ledger held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: DashMap<(String, String), LedgerRecord>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records of one tenant, oldest first.
    pub fn records_for(&self, tenant_id: &str) -> Vec<LedgerRecord> {
        let mut records: Vec<LedgerRecord> = self
            .records
            .iter()
            .filter(|e| e.key().0 == tenant_id)
            .map(|e| e.value().clone())
            .collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        records
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn put(&self, record: &LedgerRecord) -> Result<PutOutcome, LedgerError> {
        let key = (record.tenant_id.clone(), record.record_id.clone());
        match self.records.entry(key) {
            Entry::Occupied(mut stale) if stale.get().is_expired(timestamp::now()) => {
                stale.insert(record.clone());
                Ok(PutOutcome::Written)
            }
            Entry::Occupied(existing) if existing.get().same_content(record) => {
                Ok(PutOutcome::Duplicate)
            }
            Entry::Occupied(_) => Err(LedgerError::Conflict {
                tenant_id: record.tenant_id.clone(),
                record_id: record.record_id.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(PutOutcome::Written)
            }
        }
    }

    async fn get(
        &self,
        tenant_id: &str,
        record_id: &str,
    ) -> Result<Option<LedgerRecord>, LedgerError> {
        Ok(self
            .records
            .get(&(tenant_id.to_string(), record_id.to_string()))
            .filter(|r| !r.is_expired(timestamp::now()))
            .map(|r| r.value().clone()))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, LedgerError> {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        let purged = before.saturating_sub(self.records.len());
        if purged > 0 {
            tracing::info!(purged, "expired ledger records removed");
        }
        Ok(purged)
    }
}
