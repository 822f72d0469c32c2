//! In-memory presence and session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a user was last seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: String,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub current_page: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// One page visit within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVisit {
    pub page: String,
    pub duration_secs: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub referrer: Option<String>,
}

/// Per-user accumulator of page visits for the current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub visits: Vec<PageVisit>,
    pub total_duration_secs: u64,
}

impl SessionContext {
    pub fn start(user_id: impl Into<String>, session_id: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id,
            started_at: at,
            last_activity: at,
            visits: Vec::new(),
            total_duration_secs: 0,
        }
    }

    pub fn push_visit(&mut self, visit: PageVisit) {
        self.total_duration_secs += visit.duration_secs;
        if visit.timestamp > self.last_activity {
            self.last_activity = visit.timestamp;
        }
        self.visits.push(visit);
    }
}
