use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::warn;

use super::{invalid_text, ts_column, Database, StorageError};
use crate::ids;
use crate::models::{
    Agent, AgentStatus, AgentSummary, CreateAgentInput, Task, TaskPriority, TaskStatus,
};

const AGENT_COLUMNS: &str =
    "id, name, status, current_task, model, started_at, last_ping, session_key, metadata";

fn agent_from_row(row: &Row) -> Result<Agent, rusqlite::Error> {
    let status_raw: String = row.get(2)?;
    let status = AgentStatus::from_str(&status_raw)
        .ok_or_else(|| invalid_text(2, format!("invalid agent status: {status_raw}")))?;
    let metadata = row
        .get::<_, Option<String>>(8)?
        .map(|raw| serde_json::from_str(&raw).map_err(|err| super::column_error(8, err)))
        .transpose()?;

    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        status,
        current_task: row.get(3)?,
        model: row.get(4)?,
        started_at: ts_column(row, 5)?,
        last_ping: ts_column(row, 6)?,
        session_key: row.get(7)?,
        metadata,
    })
}

impl Database {
    /// All agents, most recently pinged first, each annotated with its open
    /// task count and unread report count. The counts are correlated
    /// subqueries evaluated per row; fine for a dashboard-sized fleet.
    pub fn list_agents(&self) -> Result<Vec<AgentSummary>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT a.id, a.name, a.status, a.current_task, a.model, a.started_at, a.last_ping,
                    a.session_key, a.metadata,
                    (SELECT COUNT(*) FROM tasks WHERE assigned_to = a.id AND status != 'completed') AS active_tasks,
                    (SELECT COUNT(*) FROM reports WHERE agent_id = a.id AND status = 'unread') AS unread_reports
             FROM agents a
             ORDER BY a.last_ping DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(AgentSummary {
                agent: agent_from_row(row)?,
                active_tasks: row.get(9)?,
                unread_reports: row.get(10)?,
            })
        })?;

        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?);
        }
        Ok(agents)
    }

    pub fn get_agent(&self, id: &str) -> Result<Option<Agent>, StorageError> {
        let conn = self.conn()?;
        let agent = conn
            .query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
                [id],
                agent_from_row,
            )
            .optional()?;
        Ok(agent)
    }

    /// Insert a new agent, plus its initial task when one was supplied, in
    /// a single transaction. Partial agent/task state is never observable.
    ///
    /// `spawn_pending` reserves the agent for a remote spawn attempt: it
    /// commits as `pending` and the caller settles it with
    /// [`Database::settle_agent_spawn`] once the gateway has answered. With
    /// no reservation, an agent born with a task is immediately `working`.
    pub fn create_agent(
        &self,
        input: &CreateAgentInput,
        spawn_pending: bool,
    ) -> Result<(Agent, Option<Task>), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let now = Utc::now();
        let agent_id = ids::generate("agent");
        let status = match (&input.task, spawn_pending) {
            (None, _) => AgentStatus::Idle,
            (Some(_), true) => AgentStatus::Pending,
            (Some(_), false) => AgentStatus::Working,
        };
        let metadata_json = input
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        tx.execute(
            "INSERT INTO agents (id, name, status, current_task, model, started_at, last_ping, session_key, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)",
            params![
                agent_id,
                input.name,
                status.as_str(),
                input.task,
                input.model,
                now.to_rfc3339(),
                now.to_rfc3339(),
                metadata_json,
            ],
        )?;

        let task = match &input.task {
            Some(title) => {
                let task_id = ids::generate("task");
                tx.execute(
                    "INSERT INTO tasks (id, title, status, priority, assigned_to, created_at, started_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        task_id,
                        title,
                        TaskStatus::InProgress.as_str(),
                        TaskPriority::High.as_str(),
                        agent_id,
                        now.to_rfc3339(),
                        now.to_rfc3339(),
                    ],
                )?;
                Some(Task {
                    id: task_id,
                    title: title.clone(),
                    description: None,
                    status: TaskStatus::InProgress,
                    priority: TaskPriority::High,
                    assigned_to: Some(agent_id.clone()),
                    project_id: None,
                    issue_number: None,
                    created_at: now,
                    started_at: Some(now),
                    completed_at: None,
                })
            }
            None => None,
        };

        tx.commit()?;

        let agent = Agent {
            id: agent_id,
            name: input.name.clone(),
            status,
            current_task: input.task.clone(),
            model: input.model.clone(),
            started_at: now,
            last_ping: now,
            session_key: None,
            metadata: input.metadata.clone(),
        };
        Ok((agent, task))
    }

    /// Settle a `pending` spawn reservation to its outcome.
    pub fn settle_agent_spawn(
        &self,
        id: &str,
        status: AgentStatus,
        session_key: Option<&str>,
    ) -> Result<bool, StorageError> {
        let conn = self.conn()?;
        let changes = conn.execute(
            "UPDATE agents SET status = ?2, session_key = ?3 WHERE id = ?1",
            params![id, status.as_str(), session_key],
        )?;
        Ok(changes > 0)
    }

    /// Flip the agent to `terminated` and release its unfinished tasks.
    /// Completed tasks keep their attribution. Returns false when the agent
    /// does not exist. A remote session attached to the agent is left
    /// running; there is no teardown call on the gateway.
    pub fn terminate_agent(&self, id: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let session_key: Option<Option<String>> = tx
            .query_row("SELECT session_key FROM agents WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        let Some(session_key) = session_key else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE agents SET status = ?2 WHERE id = ?1",
            params![id, AgentStatus::Terminated.as_str()],
        )?;
        tx.execute(
            "UPDATE tasks SET assigned_to = NULL WHERE assigned_to = ?1 AND status != 'completed'",
            [id],
        )?;
        tx.commit()?;

        if let Some(key) = session_key {
            warn!(agent = id, session_key = %key, "terminated agent still holds a remote session");
        }
        Ok(true)
    }
}
