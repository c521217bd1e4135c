use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::tasks::task_from_row;
use super::{invalid_text, ts_column, Database, StorageError};
use crate::models::{Project, ProjectStatus, ProjectWithTasks, SyncedRepo, Task};

fn project_from_row(row: &Row) -> Result<Project, rusqlite::Error> {
    let status_raw: String = row.get(3)?;
    let status = ProjectStatus::from_str(&status_raw)
        .ok_or_else(|| invalid_text(3, format!("invalid project status: {status_raw}")))?;

    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status,
        github_repo: row.get(4)?,
        created_at: ts_column(row, 5)?,
        updated_at: ts_column(row, 6)?,
    })
}

impl Database {
    /// Projects newest-updated first, each with its open-task count and its
    /// full task list. One extra query per project; the dashboard lists a
    /// handful of projects, so the N+1 read stays.
    pub fn list_projects(&self) -> Result<Vec<ProjectWithTasks>, StorageError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT p.id, p.name, p.description, p.status, p.github_repo, p.created_at, p.updated_at,
                    (SELECT COUNT(*) FROM tasks WHERE project_id = p.id AND status != 'completed') AS pending_tasks
             FROM projects p
             ORDER BY p.updated_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((project_from_row(row)?, row.get::<_, i64>(7)?))
        })?;

        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }

        let mut task_stmt = conn.prepare(&format!(
            "SELECT t.id, t.title, t.description, t.status, t.priority, t.assigned_to, \
                    t.project_id, t.issue_number, t.created_at, t.started_at, t.completed_at \
             FROM tasks t WHERE t.project_id = ?1 {}",
            super::tasks::TASK_ORDER,
        ))?;

        let mut out = Vec::with_capacity(projects.len());
        for (project, pending_tasks) in projects {
            let task_rows = task_stmt.query_map([&project.id], task_from_row)?;
            let mut tasks: Vec<Task> = Vec::new();
            for task in task_rows {
                tasks.push(task?);
            }
            out.push(ProjectWithTasks { project, pending_tasks, tasks });
        }
        Ok(out)
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>, StorageError> {
        let conn = self.conn()?;
        let project = conn
            .query_row(
                "SELECT id, name, description, status, github_repo, created_at, updated_at
                 FROM projects WHERE id = ?1",
                [id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// Upsert one synced repository under its stable `gh-<remote id>` key.
    /// A fresh row comes in as `active`; an existing row keeps its status
    /// and created_at and gets its name/description/repo link refreshed.
    pub fn upsert_synced_project(&self, repo: &SyncedRepo) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO projects (id, name, description, status, github_repo, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 github_repo = excluded.github_repo,
                 updated_at = excluded.updated_at",
            params![
                format!("gh-{}", repo.remote_id),
                repo.name,
                repo.description,
                ProjectStatus::Active.as_str(),
                repo.full_name,
                now,
            ],
        )?;
        Ok(())
    }
}
