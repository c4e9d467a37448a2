//! SQLite-backed checkpoint store implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    Batch, BatchFilter, BatchStatus, BatchStore, CreateBatchRequest, Item, ItemStageState,
    StageCounters, StageOutcome, StageResult, StoreError,
};

/// SQLite-backed batch store.
///
/// The connection is guarded by a mutex acquired per call; no caller ever
/// holds it across an external operation.
pub struct SqliteBatchStore {
    conn: Mutex<Connection>,
}

impl SqliteBatchStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS batches (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                stages TEXT NOT NULL,
                current_stage INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                counters TEXT NOT NULL DEFAULT '{}',
                gate_confirmed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                started_at TEXT,
                paused_at TEXT,
                completed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                batch_id TEXT NOT NULL,
                item_ref TEXT NOT NULL,
                stages TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_batch ON items(batch_id);

            CREATE TABLE IF NOT EXISTS stage_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                batch_id TEXT NOT NULL,
                item_id TEXT,
                stage TEXT NOT NULL,
                outcome TEXT NOT NULL,
                message TEXT NOT NULL,
                error TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_results_batch ON stage_results(batch_id, id);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn parse_timestamp(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_batch(row: &rusqlite::Row) -> rusqlite::Result<Batch> {
        let id: String = row.get(0)?;
        let name: String = row.get(1)?;
        let stages_json: String = row.get(2)?;
        let current_stage: i64 = row.get(3)?;
        let status_str: String = row.get(4)?;
        let counters_json: String = row.get(5)?;
        let gate_confirmed: bool = row.get(6)?;
        let created_at: String = row.get(7)?;
        let started_at: Option<String> = row.get(8)?;
        let paused_at: Option<String> = row.get(9)?;
        let completed_at: Option<String> = row.get(10)?;

        let stages: Vec<String> = serde_json::from_str(&stages_json).unwrap_or_default();
        let counters: HashMap<String, StageCounters> =
            serde_json::from_str(&counters_json).unwrap_or_default();
        let status = BatchStatus::parse(&status_str).unwrap_or(BatchStatus::Paused);

        Ok(Batch {
            id,
            name,
            stages,
            current_stage: current_stage.max(0) as usize,
            status,
            counters,
            gate_confirmed,
            created_at: Self::parse_timestamp(&created_at),
            started_at: started_at.as_deref().map(Self::parse_timestamp),
            paused_at: paused_at.as_deref().map(Self::parse_timestamp),
            completed_at: completed_at.as_deref().map(Self::parse_timestamp),
        })
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
        let id: String = row.get(0)?;
        let batch_id: String = row.get(1)?;
        let item_ref: String = row.get(2)?;
        let stages_json: String = row.get(3)?;
        let created_at: String = row.get(4)?;
        let updated_at: String = row.get(5)?;

        let stages: HashMap<String, ItemStageState> =
            serde_json::from_str(&stages_json).unwrap_or_default();

        Ok(Item {
            id,
            batch_id,
            item_ref,
            stages,
            created_at: Self::parse_timestamp(&created_at),
            updated_at: Self::parse_timestamp(&updated_at),
        })
    }

    fn row_to_result(row: &rusqlite::Row) -> rusqlite::Result<StageResult> {
        let id: i64 = row.get(0)?;
        let batch_id: String = row.get(1)?;
        let item_id: Option<String> = row.get(2)?;
        let stage: String = row.get(3)?;
        let outcome_str: String = row.get(4)?;
        let message: String = row.get(5)?;
        let error: Option<String> = row.get(6)?;
        let created_at: String = row.get(7)?;

        Ok(StageResult {
            id,
            batch_id,
            item_id,
            stage,
            outcome: StageOutcome::parse(&outcome_str).unwrap_or(StageOutcome::Failure),
            message,
            error,
            created_at: Self::parse_timestamp(&created_at),
        })
    }

    const BATCH_COLUMNS: &'static str = "id, name, stages, current_stage, status, counters, \
         gate_confirmed, created_at, started_at, paused_at, completed_at";
}

impl BatchStore for SqliteBatchStore {
    fn create_batch(&self, request: CreateBatchRequest) -> Result<Batch, StoreError> {
        let mut conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let stages_json = serde_json::to_string(&request.stages)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO batches (id, name, stages, current_stage, status, counters, gate_confirmed, created_at) \
             VALUES (?, ?, ?, 0, ?, '{}', 0, ?)",
            params![
                id,
                request.name,
                stages_json,
                BatchStatus::Paused.as_str(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        for item_ref in &request.item_refs {
            tx.execute(
                "INSERT INTO items (id, batch_id, item_ref, stages, created_at, updated_at) \
                 VALUES (?, ?, ?, '{}', ?, ?)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    id,
                    item_ref,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tx.commit().map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Batch {
            id,
            name: request.name,
            stages: request.stages,
            current_stage: 0,
            status: BatchStatus::Paused,
            counters: HashMap::new(),
            gate_confirmed: false,
            created_at: now,
            started_at: None,
            paused_at: None,
            completed_at: None,
        })
    }

    fn get_batch(&self, id: &str) -> Result<Option<Batch>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!("SELECT {} FROM batches WHERE id = ?", Self::BATCH_COLUMNS),
            params![id],
            Self::row_to_batch,
        );

        match result {
            Ok(batch) => Ok(Some(batch)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn list_batches(&self, filter: &BatchFilter) -> Result<Vec<Batch>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, status_param) = match &filter.status {
            Some(status) => ("WHERE status = ?", Some(status.clone())),
            None => ("", None),
        };

        let sql = format!(
            "SELECT {} FROM batches {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            Self::BATCH_COLUMNS,
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = match status_param {
            Some(status) => stmt
                .query_map(params![status, filter.limit, filter.offset], Self::row_to_batch)
                .map_err(|e| StoreError::Database(e.to_string()))?
                .collect::<Result<Vec<_>, _>>(),
            None => stmt
                .query_map(params![filter.limit, filter.offset], Self::row_to_batch)
                .map_err(|e| StoreError::Database(e.to_string()))?
                .collect::<Result<Vec<_>, _>>(),
        };

        rows.map_err(|e| StoreError::Database(e.to_string()))
    }

    fn update_status(&self, id: &str, status: BatchStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        let updated = match status {
            BatchStatus::Running => conn.execute(
                "UPDATE batches SET status = ?, started_at = COALESCE(started_at, ?) WHERE id = ?",
                params![status.as_str(), now, id],
            ),
            BatchStatus::Paused => conn.execute(
                "UPDATE batches SET status = ?, paused_at = ? WHERE id = ?",
                params![status.as_str(), now, id],
            ),
            BatchStatus::Completed | BatchStatus::Error => conn.execute(
                "UPDATE batches SET status = ?, completed_at = ? WHERE id = ?",
                params![status.as_str(), now, id],
            ),
        }
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::BatchNotFound(id.to_string()));
        }
        Ok(())
    }

    fn set_gate_confirmed(&self, id: &str, confirmed: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE batches SET gate_confirmed = ? WHERE id = ?",
                params![confirmed, id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::BatchNotFound(id.to_string()));
        }
        Ok(())
    }

    fn checkpoint(
        &self,
        id: &str,
        stage_index: usize,
        status: BatchStatus,
        counters: &StageCounters,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        // Read-merge-write the counters map under the same lock so two
        // checkpoints for different stages cannot clobber each other.
        let (stages_json, counters_json): (String, String) = conn
            .query_row(
                "SELECT stages, counters FROM batches WHERE id = ?",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::BatchNotFound(id.to_string()),
                other => StoreError::Database(other.to_string()),
            })?;

        let stages: Vec<String> = serde_json::from_str(&stages_json).unwrap_or_default();
        let mut merged: HashMap<String, StageCounters> =
            serde_json::from_str(&counters_json).unwrap_or_default();

        if let Some(stage_name) = stages.get(stage_index) {
            merged.insert(stage_name.clone(), counters.clone());
        }

        let merged_json =
            serde_json::to_string(&merged).map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "UPDATE batches SET current_stage = ?, status = ?, counters = ? WHERE id = ?",
            params![stage_index as i64, status.as_str(), merged_json, id],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn delete_batch(&self, id: &str) -> Result<Batch, StoreError> {
        let batch = self
            .get_batch(id)?
            .ok_or_else(|| StoreError::BatchNotFound(id.to_string()))?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tx.execute("DELETE FROM stage_results WHERE batch_id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tx.execute("DELETE FROM items WHERE batch_id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tx.execute("DELETE FROM batches WHERE id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tx.commit().map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(batch)
    }

    fn items(&self, batch_id: &str) -> Result<Vec<Item>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, batch_id, item_ref, stages, created_at, updated_at \
                 FROM items WHERE batch_id = ? ORDER BY rowid",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![batch_id], Self::row_to_item)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>();

        rows.map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_item(&self, id: &str) -> Result<Option<Item>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT id, batch_id, item_ref, stages, created_at, updated_at \
             FROM items WHERE id = ?",
            params![id],
            Self::row_to_item,
        );

        match result {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn update_item_stage(
        &self,
        item_id: &str,
        stage: &str,
        state: &ItemStageState,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let stages_json: String = conn
            .query_row(
                "SELECT stages FROM items WHERE id = ?",
                params![item_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StoreError::ItemNotFound(item_id.to_string())
                }
                other => StoreError::Database(other.to_string()),
            })?;

        let mut stages: HashMap<String, ItemStageState> =
            serde_json::from_str(&stages_json).unwrap_or_default();
        stages.insert(stage.to_string(), state.clone());

        let updated_json =
            serde_json::to_string(&stages).map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "UPDATE items SET stages = ?, updated_at = ? WHERE id = ?",
            params![updated_json, Utc::now().to_rfc3339(), item_id],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn append_result(&self, result: &StageResult) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO stage_results (batch_id, item_id, stage, outcome, message, error, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                result.batch_id,
                result.item_id,
                result.stage,
                result.outcome.as_str(),
                result.message,
                result.error,
                result.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn recent_results(&self, batch_id: &str, limit: i64) -> Result<Vec<StageResult>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, batch_id, item_id, stage, outcome, message, error, created_at \
                 FROM stage_results WHERE batch_id = ? ORDER BY id DESC LIMIT ?",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![batch_id, limit], Self::row_to_result)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>();

        rows.map_err(|e| StoreError::Database(e.to_string()))
    }

    fn recover_interrupted(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT id FROM batches WHERE status = 'running'")
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if !ids.is_empty() {
            conn.execute(
                "UPDATE batches SET status = 'paused', paused_at = ? WHERE status = 'running'",
                params![Utc::now().to_rfc3339()],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteBatchStore {
        SqliteBatchStore::in_memory().unwrap()
    }

    fn create_request() -> CreateBatchRequest {
        CreateBatchRequest {
            name: "migration-wave-1".to_string(),
            stages: vec!["dns_zone".to_string(), "verify".to_string()],
            item_refs: vec!["alpha.example".to_string(), "beta.example".to_string()],
        }
    }

    #[test]
    fn test_create_and_get_batch() {
        let store = store();
        let batch = store.create_batch(create_request()).unwrap();

        assert_eq!(batch.status, BatchStatus::Paused);
        assert_eq!(batch.current_stage, 0);
        assert!(!batch.gate_confirmed);

        let fetched = store.get_batch(&batch.id).unwrap().unwrap();
        assert_eq!(fetched.name, "migration-wave-1");
        assert_eq!(fetched.stages, vec!["dns_zone", "verify"]);

        let items = store.items(&batch.id).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_ref, "alpha.example");
    }

    #[test]
    fn test_get_missing_batch() {
        let store = store();
        assert!(store.get_batch("nope").unwrap().is_none());
    }

    #[test]
    fn test_status_transitions_set_timestamps() {
        let store = store();
        let batch = store.create_batch(create_request()).unwrap();

        store.update_status(&batch.id, BatchStatus::Running).unwrap();
        let running = store.get_batch(&batch.id).unwrap().unwrap();
        assert_eq!(running.status, BatchStatus::Running);
        assert!(running.started_at.is_some());

        store.update_status(&batch.id, BatchStatus::Paused).unwrap();
        let paused = store.get_batch(&batch.id).unwrap().unwrap();
        assert!(paused.paused_at.is_some());
        // started_at is preserved across pause
        assert_eq!(paused.started_at, running.started_at);

        store
            .update_status(&batch.id, BatchStatus::Completed)
            .unwrap();
        let done = store.get_batch(&batch.id).unwrap().unwrap();
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn test_update_status_missing_batch() {
        let store = store();
        let result = store.update_status("nope", BatchStatus::Running);
        assert!(matches!(result, Err(StoreError::BatchNotFound(_))));
    }

    #[test]
    fn test_checkpoint_merges_counters() {
        let store = store();
        let batch = store.create_batch(create_request()).unwrap();

        let counters = StageCounters {
            succeeded: 2,
            ..Default::default()
        };
        store
            .checkpoint(&batch.id, 0, BatchStatus::Running, &counters)
            .unwrap();

        let second = StageCounters {
            succeeded: 1,
            skipped: 1,
            ..Default::default()
        };
        store
            .checkpoint(&batch.id, 1, BatchStatus::Running, &second)
            .unwrap();

        let fetched = store.get_batch(&batch.id).unwrap().unwrap();
        assert_eq!(fetched.current_stage, 1);
        assert_eq!(fetched.counters.get("dns_zone").unwrap().succeeded, 2);
        assert_eq!(fetched.counters.get("verify").unwrap().skipped, 1);
    }

    #[test]
    fn test_item_stage_roundtrip() {
        let store = store();
        let batch = store.create_batch(create_request()).unwrap();
        let items = store.items(&batch.id).unwrap();

        let state = ItemStageState {
            complete: true,
            retry_count: 1,
            last_error: None,
            artifact: Some(crate::batch::ArtifactPayload::DnsZone {
                zone_id: "z-9".to_string(),
                nameservers: vec![],
            }),
        };
        store
            .update_item_stage(&items[0].id, "dns_zone", &state)
            .unwrap();

        let fetched = store.get_item(&items[0].id).unwrap().unwrap();
        assert_eq!(fetched.stage_state("dns_zone"), state);
        // Other item untouched
        let other = store.get_item(&items[1].id).unwrap().unwrap();
        assert!(!other.stage_state("dns_zone").complete);
    }

    #[test]
    fn test_update_missing_item() {
        let store = store();
        let result = store.update_item_stage("nope", "dns_zone", &ItemStageState::default());
        assert!(matches!(result, Err(StoreError::ItemNotFound(_))));
    }

    #[test]
    fn test_append_and_list_results() {
        let store = store();
        let batch = store.create_batch(create_request()).unwrap();

        for i in 0..5 {
            let id = store
                .append_result(&StageResult {
                    id: 0,
                    batch_id: batch.id.clone(),
                    item_id: None,
                    stage: "dns_zone".to_string(),
                    outcome: StageOutcome::Success,
                    message: format!("event {}", i),
                    error: None,
                    created_at: Utc::now(),
                })
                .unwrap();
            assert!(id > 0);
        }

        let recent = store.recent_results(&batch.id, 3).unwrap();
        assert_eq!(recent.len(), 3);
        // Newest first
        assert_eq!(recent[0].message, "event 4");
    }

    #[test]
    fn test_delete_batch_cascades() {
        let store = store();
        let batch = store.create_batch(create_request()).unwrap();
        store
            .append_result(&StageResult {
                id: 0,
                batch_id: batch.id.clone(),
                item_id: None,
                stage: "dns_zone".to_string(),
                outcome: StageOutcome::Success,
                message: "ok".to_string(),
                error: None,
                created_at: Utc::now(),
            })
            .unwrap();

        let deleted = store.delete_batch(&batch.id).unwrap();
        assert_eq!(deleted.id, batch.id);

        assert!(store.get_batch(&batch.id).unwrap().is_none());
        assert!(store.items(&batch.id).unwrap().is_empty());
        assert!(store.recent_results(&batch.id, 10).unwrap().is_empty());
    }

    #[test]
    fn test_recover_interrupted() {
        let store = store();
        let running = store.create_batch(create_request()).unwrap();
        let paused = store.create_batch(create_request()).unwrap();

        store
            .update_status(&running.id, BatchStatus::Running)
            .unwrap();

        let recovered = store.recover_interrupted().unwrap();
        assert_eq!(recovered, vec![running.id.clone()]);

        let batch = store.get_batch(&running.id).unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Paused);

        let untouched = store.get_batch(&paused.id).unwrap().unwrap();
        assert_eq!(untouched.status, BatchStatus::Paused);

        // Second pass finds nothing
        assert!(store.recover_interrupted().unwrap().is_empty());
    }

    #[test]
    fn test_gate_confirmed_flag() {
        let store = store();
        let batch = store.create_batch(create_request()).unwrap();

        store.set_gate_confirmed(&batch.id, true).unwrap();
        assert!(store.get_batch(&batch.id).unwrap().unwrap().gate_confirmed);

        store.set_gate_confirmed(&batch.id, false).unwrap();
        assert!(!store.get_batch(&batch.id).unwrap().unwrap().gate_confirmed);
    }

    #[test]
    fn test_list_batches_filter() {
        let store = store();
        let a = store.create_batch(create_request()).unwrap();
        let _b = store.create_batch(create_request()).unwrap();

        store.update_status(&a.id, BatchStatus::Running).unwrap();

        let running = store
            .list_batches(&BatchFilter::new().with_status("running"))
            .unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, a.id);

        let all = store.list_batches(&BatchFilter::new()).unwrap();
        assert_eq!(all.len(), 2);
    }
}
