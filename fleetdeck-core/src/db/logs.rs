use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{invalid_text, ts_column, Database, StorageError};
use crate::models::{AgentLog, LogLevel};

// Shared with the report transaction, which writes its log entry on the
// same connection handle.
pub(crate) fn insert_log(
    conn: &Connection,
    agent_id: &str,
    task_id: Option<&str>,
    level: LogLevel,
    message: &str,
    at: DateTime<Utc>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO agent_logs (agent_id, task_id, level, message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![agent_id, task_id, level.as_str(), message, at.to_rfc3339()],
    )?;
    Ok(())
}

impl Database {
    /// Append an audit entry for an agent.
    pub fn append_log(
        &self,
        agent_id: &str,
        task_id: Option<&str>,
        level: LogLevel,
        message: &str,
    ) -> Result<(), StorageError> {
        let conn = self.conn()?;
        insert_log(&conn, agent_id, task_id, level, message, Utc::now())?;
        Ok(())
    }

    /// Audit trail for one agent, oldest first.
    pub fn logs_for_agent(&self, agent_id: &str) -> Result<Vec<AgentLog>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, task_id, level, message, created_at
             FROM agent_logs
             WHERE agent_id = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([agent_id], |row| {
            let level_raw: String = row.get(3)?;
            let level = LogLevel::from_str(&level_raw)
                .ok_or_else(|| invalid_text(3, format!("invalid log level: {level_raw}")))?;
            Ok(AgentLog {
                id: row.get(0)?,
                agent_id: row.get(1)?,
                task_id: row.get(2)?,
                level,
                message: row.get(4)?,
                created_at: ts_column(row, 5)?,
            })
        })?;

        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?);
        }
        Ok(logs)
    }
}
