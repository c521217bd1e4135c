use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Task;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub github_repo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    Planning,
    Active,
    Completed,
    OnHold,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::OnHold => "on-hold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planning" => Some(Self::Planning),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "on-hold" => Some(Self::OnHold),
            _ => None,
        }
    }
}

/// One repository entry pulled from the hosting API, ready to upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncedRepo {
    pub remote_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectWithTasks {
    #[serde(flatten)]
    pub project: Project,
    pub pending_tasks: i64,
    pub tasks: Vec<Task>,
}
