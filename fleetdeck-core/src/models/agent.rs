use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub status: AgentStatus,
    pub current_task: Option<String>,
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_ping: DateTime<Utc>,
    pub session_key: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// `Pending` is the spawn reservation state: the agent row is committed
/// before the gateway call and settled to `Working` or `Error` afterwards,
/// so the store never claims a session that failed to start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AgentStatus {
    Idle,
    Pending,
    Working,
    Error,
    Terminated,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Working => "working",
            Self::Error => "error",
            Self::Terminated => "terminated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "pending" => Some(Self::Pending),
            "working" => Some(Self::Working),
            "error" => Some(Self::Error),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgentInput {
    pub name: String,
    pub task: Option<String>,
    pub model: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Agent annotated with the read-time counts the dashboard shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    #[serde(flatten)]
    pub agent: Agent,
    pub active_tasks: i64,
    pub unread_reports: i64,
}
