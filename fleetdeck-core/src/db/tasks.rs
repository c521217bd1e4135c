use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row, ToSql};

use super::{invalid_text, opt_ts_column, ts_column, Database, StorageError};
use crate::ids;
use crate::models::{
    CreateTaskInput, Task, TaskFilter, TaskPriority, TaskStatus, TaskWithAgent, UpdateTaskInput,
};

const TASK_COLUMNS: &str = "id, title, description, status, priority, assigned_to, project_id, \
     issue_number, created_at, started_at, completed_at";

// Critical first, then newest first within each band. Unknown values can
// only enter the store by hand; they sort last rather than erroring.
pub(crate) const TASK_ORDER: &str = "ORDER BY CASE t.priority \
     WHEN 'critical' THEN 1 WHEN 'high' THEN 2 WHEN 'medium' THEN 3 ELSE 4 END, \
     t.created_at DESC";

pub(crate) fn task_from_row(row: &Row) -> Result<Task, rusqlite::Error> {
    let status_raw: String = row.get(3)?;
    let status = TaskStatus::from_str(&status_raw)
        .ok_or_else(|| invalid_text(3, format!("invalid task status: {status_raw}")))?;
    let priority_raw: String = row.get(4)?;
    let priority = TaskPriority::from_str(&priority_raw)
        .ok_or_else(|| invalid_text(4, format!("invalid task priority: {priority_raw}")))?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status,
        priority,
        assigned_to: row.get(5)?,
        project_id: row.get(6)?,
        issue_number: row.get(7)?,
        created_at: ts_column(row, 8)?,
        started_at: opt_ts_column(row, 9)?,
        completed_at: opt_ts_column(row, 10)?,
    })
}

impl Database {
    /// Tasks joined with their assignee's name, optionally filtered by
    /// status and/or assignee, in priority order.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<TaskWithAgent>, StorageError> {
        let mut sql = format!(
            "SELECT t.id, t.title, t.description, t.status, t.priority, t.assigned_to, \
                    t.project_id, t.issue_number, t.created_at, t.started_at, t.completed_at, \
                    a.name AS assigned_name \
             FROM tasks t LEFT JOIN agents a ON t.assigned_to = a.id"
        );

        // bound values must outlive the binding list below
        let status_value: &str;
        let mut clauses: Vec<&str> = Vec::new();
        let mut bindings: Vec<&dyn ToSql> = Vec::new();
        if let Some(status) = filter.status {
            status_value = status.as_str();
            clauses.push("t.status = ?");
            bindings.push(&status_value);
        }
        if let Some(agent) = &filter.assigned_to {
            clauses.push("t.assigned_to = ?");
            bindings.push(agent);
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push(' ');
        sql.push_str(TASK_ORDER);

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(bindings.as_slice(), |row| {
            Ok(TaskWithAgent { task: task_from_row(row)?, assigned_name: row.get(11)? })
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>, StorageError> {
        let conn = self.conn()?;
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                [id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn create_task(&self, input: &CreateTaskInput) -> Result<Task, StorageError> {
        let conn = self.conn()?;
        let now = Utc::now();
        let task_id = ids::generate("task");

        conn.execute(
            "INSERT INTO tasks (id, title, description, status, priority, assigned_to, project_id, issue_number, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task_id,
                input.title,
                input.description,
                TaskStatus::Backlog.as_str(),
                input.priority.as_str(),
                input.assigned_to,
                input.project_id,
                input.issue_number,
                now.to_rfc3339(),
            ],
        )?;

        Ok(Task {
            id: task_id,
            title: input.title.clone(),
            description: input.description.clone(),
            status: TaskStatus::Backlog,
            priority: input.priority,
            assigned_to: input.assigned_to.clone(),
            project_id: input.project_id.clone(),
            issue_number: input.issue_number,
            created_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    /// Partial update. Moving to `in-progress` stamps `started_at`, moving
    /// to `completed` stamps `completed_at`; every other status leaves both
    /// timestamps exactly as they were. Returns false when no such task.
    pub fn update_task(&self, id: &str, input: &UpdateTaskInput) -> Result<bool, StorageError> {
        // bound values must outlive the binding list below
        let status_value: &str;
        let stamp_value: String;
        let assign_value: String;
        let mut sets: Vec<&str> = Vec::new();
        let mut bindings: Vec<&dyn ToSql> = Vec::new();

        if let Some(status) = input.status {
            status_value = status.as_str();
            sets.push("status = ?");
            bindings.push(&status_value);
            match status {
                TaskStatus::InProgress => {
                    stamp_value = Utc::now().to_rfc3339();
                    sets.push("started_at = ?");
                    bindings.push(&stamp_value);
                }
                TaskStatus::Completed => {
                    stamp_value = Utc::now().to_rfc3339();
                    sets.push("completed_at = ?");
                    bindings.push(&stamp_value);
                }
                _ => {}
            }
        }

        match &input.assigned_to {
            Some(Some(agent_id)) => {
                assign_value = agent_id.clone();
                sets.push("assigned_to = ?");
                bindings.push(&assign_value);
            }
            Some(None) => sets.push("assigned_to = NULL"),
            None => {}
        }

        if sets.is_empty() {
            return Ok(self.get_task(id)?.is_some());
        }

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
        bindings.push(&id);

        let conn = self.conn()?;
        let changes = conn.execute(&sql, bindings.as_slice())?;
        Ok(changes > 0)
    }
}
