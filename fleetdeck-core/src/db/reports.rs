use chrono::Utc;
use rusqlite::{params, Row, ToSql};

use super::logs::insert_log;
use super::{invalid_text, ts_column, Database, StorageError};
use crate::ids;
use crate::models::{
    CreateReportInput, LogLevel, Report, ReportFilter, ReportStatus, ReportType,
    ReportWithContext, TaskStatus,
};

fn report_from_row(row: &Row) -> Result<Report, rusqlite::Error> {
    let type_raw: String = row.get(3)?;
    let report_type = ReportType::from_str(&type_raw)
        .ok_or_else(|| invalid_text(3, format!("invalid report type: {type_raw}")))?;
    let status_raw: String = row.get(6)?;
    let status = ReportStatus::from_str(&status_raw)
        .ok_or_else(|| invalid_text(6, format!("invalid report status: {status_raw}")))?;

    Ok(Report {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        task_id: row.get(2)?,
        report_type,
        title: row.get(4)?,
        content: row.get(5)?,
        status,
        created_at: ts_column(row, 7)?,
    })
}

impl Database {
    /// Reports newest first, joined with agent name and task title,
    /// optionally filtered by status and/or authoring agent.
    pub fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<ReportWithContext>, StorageError> {
        let mut sql = String::from(
            "SELECT r.id, r.agent_id, r.task_id, r.type, r.title, r.content, r.status, r.created_at, \
                    a.name AS agent_name, t.title AS task_title \
             FROM reports r \
             LEFT JOIN agents a ON r.agent_id = a.id \
             LEFT JOIN tasks t ON r.task_id = t.id",
        );

        // bound values must outlive the binding list below
        let status_value: &str;
        let mut clauses: Vec<&str> = Vec::new();
        let mut bindings: Vec<&dyn ToSql> = Vec::new();
        if let Some(status) = filter.status {
            status_value = status.as_str();
            clauses.push("r.status = ?");
            bindings.push(&status_value);
        }
        if let Some(agent) = &filter.agent_id {
            clauses.push("r.agent_id = ?");
            bindings.push(agent);
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY r.created_at DESC LIMIT ?");
        bindings.push(&filter.limit);

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(bindings.as_slice(), |row| {
            Ok(ReportWithContext {
                report: report_from_row(row)?,
                agent_name: row.get(8)?,
                task_title: row.get(9)?,
            })
        })?;

        let mut reports = Vec::new();
        for row in rows {
            reports.push(row?);
        }
        Ok(reports)
    }

    /// Insert a report, its audit log entry, and — for a completion report
    /// tied to a task — that task's move to `review`, in one transaction.
    /// The completion rule fires regardless of the task's prior status.
    pub fn create_report(&self, input: &CreateReportInput) -> Result<Report, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let now = Utc::now();
        let report_id = ids::generate("report");
        let content = input.content.clone().unwrap_or_default();

        tx.execute(
            "INSERT INTO reports (id, agent_id, task_id, type, title, content, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                report_id,
                input.agent_id,
                input.task_id,
                input.report_type.as_str(),
                input.title,
                content,
                ReportStatus::Unread.as_str(),
                now.to_rfc3339(),
            ],
        )?;

        insert_log(
            &tx,
            &input.agent_id,
            input.task_id.as_deref(),
            LogLevel::Info,
            &format!("Submitted report: {}", input.title),
            now,
        )?;

        if input.report_type == ReportType::Completion {
            if let Some(task_id) = &input.task_id {
                tx.execute(
                    "UPDATE tasks SET status = ?2 WHERE id = ?1",
                    params![task_id, TaskStatus::Review.as_str()],
                )?;
            }
        }

        tx.commit()?;

        Ok(Report {
            id: report_id,
            agent_id: input.agent_id.clone(),
            task_id: input.task_id.clone(),
            report_type: input.report_type,
            title: input.title.clone(),
            content,
            status: ReportStatus::Unread,
            created_at: now,
        })
    }

    /// Overwrite a report's status. Returns false when no such report.
    pub fn set_report_status(&self, id: &str, status: ReportStatus) -> Result<bool, StorageError> {
        let conn = self.conn()?;
        let changes = conn.execute(
            "UPDATE reports SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(changes > 0)
    }
}
