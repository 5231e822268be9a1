//! Append-only state ledger backed by redb.
//!
//! # Table design
//!
//! A single `STATES` table keyed by commit sequence (`u64`, starting at 1).
//! Values are JSON-encoded [`LedgerEntry`] records. Entries are never
//! rewritten or removed, so key order is commit order. Lookups walk keys
//! in reverse and stop at the first match.
//!
//! redb calls are synchronous and run on the blocking pool.
//!
//! Without an access token the ledger runs offline: lookups return a
//! synthetic record and commits are skipped.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::collaborator::Ledger;
use crate::config::LedgerConfig;
use crate::error::{CollaboratorError, CommanderError, Result};
use crate::types::{HistoricalRecord, StateVector, TimestampSelector, TxnId};

/// Key: commit sequence. Value: JSON-encoded `LedgerEntry`.
const STATES: TableDefinition<u64, &[u8]> = TableDefinition::new("states");

/// Payload returned by offline lookups.
pub const SYNTHETIC_DATA: &str = "default_state_data";

/// One committed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64,
    pub txn_id: TxnId,
    pub vector: StateVector,
    pub committed_at: DateTime<Utc>,
}

fn store_err(e: impl std::fmt::Display) -> CollaboratorError {
    CollaboratorError::Backend(e.to_string())
}

fn join_err(e: tokio::task::JoinError) -> CollaboratorError {
    CollaboratorError::Backend(format!("ledger task join error: {e}"))
}

/// Result of a history scan.
#[derive(Debug, Clone, PartialEq)]
struct LookupHit {
    /// Total entries in the table.
    commits: u64,
    latest: Option<LedgerEntry>,
    /// Rows decoded before the scan stopped.
    scanned: u64,
}

/// Walk the table newest-first and stop at the first entry for `vector`
/// that `at` admits. Rows older than the hit are never read.
fn find_latest(
    db: &Database,
    vector: &StateVector,
    at: TimestampSelector,
) -> std::result::Result<LookupHit, CollaboratorError> {
    let rt = db.begin_read().map_err(store_err)?;
    let table = rt.open_table(STATES).map_err(store_err)?;
    let commits = table.len().map_err(store_err)?;

    let mut scanned = 0;
    for row in table.iter().map_err(store_err)?.rev() {
        let (_, v) = row.map_err(store_err)?;
        scanned += 1;
        let entry: LedgerEntry = serde_json::from_slice(v.value()).map_err(store_err)?;
        let admitted = match at {
            TimestampSelector::Latest => true,
            TimestampSelector::At(ts) => entry.committed_at <= ts,
        };
        if admitted && &entry.vector == vector {
            return Ok(LookupHit {
                commits,
                latest: Some(entry),
                scanned,
            });
        }
    }
    Ok(LookupHit {
        commits,
        latest: None,
        scanned,
    })
}

fn append(db: &Database, state: StateVector) -> std::result::Result<LedgerEntry, CollaboratorError> {
    let wt = db.begin_write().map_err(store_err)?;
    let entry = {
        let mut table = wt.open_table(STATES).map_err(store_err)?;
        let seq = table
            .last()
            .map_err(store_err)?
            .map(|(k, _)| k.value() + 1)
            .unwrap_or(1);
        let committed_at = Utc::now();
        let entry = LedgerEntry {
            seq,
            txn_id: TxnId::new(format!("txn_{}_{seq}", committed_at.timestamp_millis())),
            vector: state,
            committed_at,
        };
        let value = serde_json::to_vec(&entry).map_err(store_err)?;
        table.insert(seq, value.as_slice()).map_err(store_err)?;
        entry
    };
    wt.commit().map_err(store_err)?;
    Ok(entry)
}

pub struct RedbLedger {
    endpoint: String,
    db: Option<Arc<Database>>,
}

impl RedbLedger {
    /// Connect when the configured token env var is set, else run offline.
    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        let endpoint = format!("{}:{}", config.host, config.port);
        if config.token().is_none() {
            tracing::warn!(
                token_env = %config.token_env,
                "ledger token not set, running in offline mode"
            );
            return Ok(Self::offline(endpoint));
        }
        tracing::info!(endpoint = %endpoint, path = %config.path.display(), "connecting ledger");
        let mut ledger = Self::open(&config.path)?;
        ledger.endpoint = endpoint;
        Ok(ledger)
    }

    /// Open or create the ledger database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(|e| CommanderError::LedgerStore(e.to_string()))?;
        // Ensure the table exists before any reads
        let wt = db
            .begin_write()
            .map_err(|e| CommanderError::LedgerStore(e.to_string()))?;
        wt.open_table(STATES)
            .map_err(|e| CommanderError::LedgerStore(e.to_string()))?;
        wt.commit()
            .map_err(|e| CommanderError::LedgerStore(e.to_string()))?;
        Ok(Self {
            endpoint: path.display().to_string(),
            db: Some(Arc::new(db)),
        })
    }

    pub fn offline(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            db: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.db.is_some()
    }

    /// All entries in commit order.
    pub fn entries(&self) -> std::result::Result<Vec<LedgerEntry>, CollaboratorError> {
        let Some(db) = &self.db else {
            return Ok(Vec::new());
        };
        let rt = db.begin_read().map_err(store_err)?;
        let table = rt.open_table(STATES).map_err(store_err)?;
        let mut entries = Vec::new();
        for row in table.iter().map_err(store_err)? {
            let (_, v) = row.map_err(store_err)?;
            let entry: LedgerEntry = serde_json::from_slice(v.value()).map_err(store_err)?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[async_trait]
impl Ledger for RedbLedger {
    async fn lookup(
        &self,
        vector: &StateVector,
        at: TimestampSelector,
    ) -> std::result::Result<HistoricalRecord, CollaboratorError> {
        let Some(db) = self.db.clone() else {
            tracing::warn!("no ledger connection, returning synthetic data");
            return Ok(HistoricalRecord::synthetic(SYNTHETIC_DATA));
        };
        tracing::debug!(vector = %vector, selector = ?at, endpoint = %self.endpoint, "querying state");

        let wanted = vector.clone();
        let hit = tokio::task::spawn_blocking(move || find_latest(&db, &wanted, at))
            .await
            .map_err(join_err)??;
        tracing::debug!(commits = hit.commits, scanned = hit.scanned, "ledger scan done");

        let data = serde_json::json!({
            "commits": hit.commits,
            "latest": hit.latest,
        });
        Ok(HistoricalRecord::retrieved(vector.clone(), data))
    }

    async fn commit(&self, state: &StateVector) -> std::result::Result<Option<TxnId>, CollaboratorError> {
        let Some(db) = self.db.clone() else {
            tracing::warn!("no ledger connection, state commit skipped (offline mode)");
            return Ok(None);
        };

        let state = state.clone();
        let entry = tokio::task::spawn_blocking(move || append(&db, state))
            .await
            .map_err(join_err)??;

        tracing::debug!(txn_id = %entry.txn_id, seq = entry.seq, "state commit successful");
        Ok(Some(entry.txn_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn v(bits: &[u8]) -> StateVector {
        StateVector::new(bits.to_vec())
    }

    #[tokio::test]
    async fn offline_ledger_degrades() {
        let ledger = RedbLedger::offline("localhost:7687");
        assert!(!ledger.is_connected());

        let record = ledger.lookup(&v(&[0, 1]), TimestampSelector::Latest).await.unwrap();
        assert!(record.synthetic);
        assert_eq!(record.data, SYNTHETIC_DATA);
        assert!(record.vector.is_none());

        assert_eq!(ledger.commit(&v(&[0, 1])).await.unwrap(), None);
    }

    #[tokio::test]
    async fn commits_append_in_sequence() {
        let dir = TempDir::new().unwrap();
        let ledger = RedbLedger::open(&dir.path().join("ledger.redb")).unwrap();

        let first = ledger.commit(&v(&[0, 1])).await.unwrap().unwrap();
        let second = ledger.commit(&v(&[1, 1])).await.unwrap().unwrap();
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("txn_"));
        assert!(second.as_str().ends_with("_2"));

        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].seq, 1);
        assert_eq!(entries[1].vector, v(&[1, 1]));
    }

    #[tokio::test]
    async fn lookup_returns_latest_matching_entry() {
        let dir = TempDir::new().unwrap();
        let ledger = RedbLedger::open(&dir.path().join("ledger.redb")).unwrap();
        ledger.commit(&v(&[0, 0])).await.unwrap();
        ledger.commit(&v(&[1, 1])).await.unwrap();
        let third = ledger.commit(&v(&[0, 0])).await.unwrap().unwrap();

        let record = ledger.lookup(&v(&[0, 0]), TimestampSelector::Latest).await.unwrap();
        assert!(!record.synthetic);
        assert_eq!(record.vector, Some(v(&[0, 0])));
        assert_eq!(record.data["commits"], 3);
        assert_eq!(record.data["latest"]["txn_id"], third.as_str());
        assert_eq!(record.data["latest"]["seq"], 3);
    }

    #[tokio::test]
    async fn lookup_before_first_commit_has_no_latest() {
        let dir = TempDir::new().unwrap();
        let ledger = RedbLedger::open(&dir.path().join("ledger.redb")).unwrap();
        ledger.commit(&v(&[1, 1])).await.unwrap();

        let record = ledger
            .lookup(&v(&[0, 0]), TimestampSelector::Latest)
            .await
            .unwrap();
        assert!(record.data["latest"].is_null());

        let past = TimestampSelector::At(Utc::now() - chrono::Duration::hours(1));
        let record = ledger.lookup(&v(&[1, 1]), past).await.unwrap();
        assert!(record.data["latest"].is_null());
    }

    #[tokio::test]
    async fn lookup_scans_newest_first_and_stops_at_match() {
        let dir = TempDir::new().unwrap();
        let ledger = RedbLedger::open(&dir.path().join("ledger.redb")).unwrap();
        for _ in 0..50 {
            ledger.commit(&v(&[1, 0])).await.unwrap();
        }
        ledger.commit(&v(&[0, 0])).await.unwrap();
        ledger.commit(&v(&[1, 1])).await.unwrap();

        let db = ledger.db.clone().unwrap();
        let hit = find_latest(&db, &v(&[0, 0]), TimestampSelector::Latest).unwrap();
        assert_eq!(hit.commits, 52);
        assert_eq!(hit.latest.unwrap().seq, 51);
        assert_eq!(hit.scanned, 2);

        let miss = find_latest(&db, &v(&[0, 1]), TimestampSelector::Latest).unwrap();
        assert!(miss.latest.is_none());
        assert_eq!(miss.scanned, 52);
    }

    #[tokio::test]
    async fn lookup_never_decodes_rows_older_than_the_match() {
        let dir = TempDir::new().unwrap();
        let ledger = RedbLedger::open(&dir.path().join("ledger.redb")).unwrap();
        {
            let db = ledger.db.as_ref().unwrap();
            let wt = db.begin_write().unwrap();
            wt.open_table(STATES)
                .unwrap()
                .insert(1u64, b"not json".as_slice())
                .unwrap();
            wt.commit().unwrap();
        }
        let txn = ledger.commit(&v(&[1, 1])).await.unwrap().unwrap();
        assert!(txn.as_str().ends_with("_2"));

        let record = ledger.lookup(&v(&[1, 1]), TimestampSelector::Latest).await.unwrap();
        assert_eq!(record.data["commits"], 2);
        assert_eq!(record.data["latest"]["seq"], 2);

        // A miss has to walk into the undecodable row.
        let err = ledger
            .lookup(&v(&[0, 0]), TimestampSelector::Latest)
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Backend(_)));
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/ledger.redb");
        {
            let ledger = RedbLedger::open(&path).unwrap();
            ledger.commit(&v(&[1, 0])).await.unwrap();
        }
        let ledger = RedbLedger::open(&path).unwrap();
        let next = ledger.commit(&v(&[0, 1])).await.unwrap().unwrap();
        assert!(next.as_str().ends_with("_2"));
        assert_eq!(ledger.entries().unwrap().len(), 2);
    }

    #[test]
    fn missing_token_means_offline() {
        let config = LedgerConfig {
            token_env: "COMMANDER_TEST_TOKEN_NEVER_SET".into(),
            ..Default::default()
        };
        let ledger = RedbLedger::from_config(&config).unwrap();
        assert!(!ledger.is_connected());
    }
}
