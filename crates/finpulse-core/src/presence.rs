//! In-memory presence and session tracking.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::error::PulseResult;
use crate::types::{
    ActivityEvent, ActivityKind, PageViewPayload, PageVisit, PresenceEntry, SessionContext,
};

/// Who is active and what they have been looking at.
///
/// Written by socket handlers and the drain loop, swept by a scheduled job.
pub struct PresenceTracker {
    presence: DashMap<String, PresenceEntry>,
    sessions: DashMap<String, SessionContext>,
    ttl: Duration,
}

impl PresenceTracker {
    /// Create a tracker whose sweep drops users idle longer than `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            presence: DashMap::new(),
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Record an activity event for its user.
    ///
    /// Presence is always updated. A page_view also appends a visit to the
    /// session, starting a new one on the first view or when the session id
    /// changes. A malformed page_view payload is reported after presence is updated.
    pub fn record_activity(&self, event: &ActivityEvent) -> PulseResult<()> {
        let user_id = event.user_id.as_str();
        let at = event.timestamp;

        let page_view = match event.kind {
            ActivityKind::PageView => Some(event.parse_payload::<PageViewPayload>()),
            _ => None,
        };
        let view = page_view.as_ref().and_then(|parsed| parsed.as_ref().ok());

        {
            let mut entry = self
                .presence
                .entry(user_id.to_string())
                .or_insert_with(|| PresenceEntry {
                    user_id: user_id.to_string(),
                    last_activity: at,
                    current_page: None,
                    session_id: None,
                });
            if at > entry.last_activity {
                entry.last_activity = at;
            }
            if let Some(view) = view {
                entry.current_page = Some(view.page.clone());
                if view.session_id.is_some() {
                    entry.session_id = view.session_id.clone();
                }
            }
        }

        match view {
            Some(view) => self.append_visit(user_id, view, at),
            None => {
                if let Some(mut session) = self.sessions.get_mut(user_id) {
                    if at > session.last_activity {
                        session.last_activity = at;
                    }
                }
            }
        }

        match page_view {
            Some(Err(e)) => Err(e),
            _ => Ok(()),
        }
    }

    fn append_visit(&self, user_id: &str, view: &PageViewPayload, at: DateTime<Utc>) {
        let visit = PageVisit {
            page: view.page.clone(),
            duration_secs: view.duration_secs.unwrap_or(0),
            timestamp: at,
            referrer: view.referrer.clone(),
        };

        let mut session = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| SessionContext::start(user_id, view.session_id.clone(), at));

        let switched = view.session_id.is_some() && view.session_id != session.session_id;
        if switched {
            debug!(user_id, session_id = ?view.session_id, "Starting new session");
            *session = SessionContext::start(user_id, view.session_id.clone(), at);
        }
        session.push_visit(visit);
    }

    /// Whether the user currently has a presence entry.
    pub fn is_active(&self, user_id: &str) -> bool {
        self.presence.contains_key(user_id)
    }

    /// Ids of all users with a presence entry, sorted.
    pub fn list_active(&self) -> Vec<String> {
        let mut users: Vec<String> = self.presence.iter().map(|e| e.key().clone()).collect();
        users.sort();
        users
    }

    pub fn active_count(&self) -> usize {
        self.presence.len()
    }

    pub fn get_session(&self, user_id: &str) -> Option<SessionContext> {
        self.sessions.get(user_id).map(|s| s.clone())
    }

    pub fn get_presence(&self, user_id: &str) -> Option<PresenceEntry> {
        self.presence.get(user_id).map(|p| p.clone())
    }

    /// Remove presence and session entries idle since before `now - ttl`.
    ///
    /// Returns the number of presence entries removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.ttl;
        let before = self.presence.len();
        self.presence.retain(|_, entry| entry.last_activity >= cutoff);
        self.sessions.retain(|_, session| session.last_activity >= cutoff);
        before - self.presence.len()
    }
}
