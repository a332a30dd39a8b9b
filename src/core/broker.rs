use crate::core::db;
use crate::core::error::ShopError;
use crate::core::schemas;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The DB Broker is the single entry point for state access.
///
/// It serializes connections in-process and appends one audit line per
/// mutating operation to `audit.events.jsonl` beside the database.
#[derive(Debug, Clone)]
pub struct DbBroker {
    db_path: PathBuf,
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuditEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(db_path: &Path) -> Self {
        let audit_log_path = db_path
            .parent()
            .map(|p| p.join(schemas::AUDIT_LOG_NAME))
            .unwrap_or_else(|| PathBuf::from(schemas::AUDIT_LOG_NAME));
        Self {
            db_path: db_path.to_path_buf(),
            audit_log_path,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn audit_log_path(&self) -> &Path {
        &self.audit_log_path
    }

    fn locked<F, R>(&self, f: F) -> Result<R, ShopError>
    where
        F: FnOnce(&Connection) -> Result<R, ShopError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let conn = db::db_connect(&self.db_path)?;
        f(&conn)
    }

    /// Run a read-only closure. Not audited.
    pub fn read<F, R>(&self, f: F) -> Result<R, ShopError>
    where
        F: FnOnce(&Connection) -> Result<R, ShopError>,
    {
        self.locked(f)
    }

    /// Run a mutating closure and record the outcome in the audit log.
    pub fn with_conn<F, R>(&self, actor: &str, op_name: &str, f: F) -> Result<R, ShopError>
    where
        F: FnOnce(&Connection) -> Result<R, ShopError>,
    {
        let result = self.locked(f);
        let status = if result.is_ok() { "success" } else { "error" };
        // The closure has already committed; an audit failure must not
        // turn that into an error the caller would retry.
        if let Err(e) = self.log_event(actor, op_name, status) {
            tracing::warn!(op = op_name, error = %e, "audit append failed");
        }
        result
    }

    fn log_event(&self, actor: &str, op: &str, status: &str) -> Result<(), ShopError> {
        let ev = AuditEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            status: status.to_string(),
        };
        let line = serde_json::to_string(&ev)
            .map_err(|e| ShopError::Validation(format!("audit encode: {}", e)))?;

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)?;
        writeln!(f, "{}", line)?;
        Ok(())
    }

    /// Most recent `limit` audit events, oldest first. Malformed lines are skipped.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<AuditEvent>, ShopError> {
        if !self.audit_log_path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.audit_log_path)?;
        let mut events: Vec<AuditEvent> = Vec::new();
        for line in BufReader::new(file).lines() {
            if let Ok(ev) = serde_json::from_str::<AuditEvent>(&line?) {
                events.push(ev);
            }
        }
        let skip = events.len().saturating_sub(limit);
        Ok(events.into_iter().skip(skip).collect())
    }
}
