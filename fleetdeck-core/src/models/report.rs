use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub agent_id: String,
    pub task_id: Option<String>,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub title: String,
    pub content: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReportType {
    Progress,
    Completion,
    Question,
    Error,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Completion => "completion",
            Self::Question => "question",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "progress" => Some(Self::Progress),
            "completion" => Some(Self::Completion),
            "question" => Some(Self::Question),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    Unread,
    Read,
    Archived,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unread" => Some(Self::Unread),
            "read" => Some(Self::Read),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReportInput {
    pub agent_id: String,
    pub task_id: Option<String>,
    pub report_type: ReportType,
    pub title: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub agent_id: Option<String>,
    pub limit: i64,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self { status: None, agent_id: None, limit: 50 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportWithContext {
    #[serde(flatten)]
    pub report: Report,
    pub agent_name: Option<String>,
    pub task_title: Option<String>,
}
