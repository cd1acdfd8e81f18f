//! Session registry — connected clients and their roles.
//!
//! DESIGN
//! ======
//! A session is created when a socket upgrades and dropped when it closes or
//! when delivery to it fails. Each entry holds the sender half of that
//! socket's bounded outbound queue; the connection task owns the receiver.
//! Ids come from a counter that never goes backwards, so a reconnecting
//! client always gets a fresh id.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use tokio::sync::mpsc;
use tracing::info;

use crate::catalog::MAIN_PAGE_ID;
use crate::message::{Outbound, SessionId, SessionSummary, now_rfc3339};
use crate::services::score::Team;

/// One connected client.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    /// Client-declared role (`team_red`, `master`, `display`, ...).
    pub role: Option<String>,
    /// Page most recently delivered to this client.
    pub current_page: String,
    pub connected_at: String,
    pub address: Option<SocketAddr>,
    /// Authority the client used to reach us; used to build asset URLs.
    pub asset_host: String,
    pub tx: mpsc::Sender<Outbound>,
}

impl Session {
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            client_id: self.id,
            mode: self.role.clone(),
            connected_at: self.connected_at.clone(),
            ip: self
                .address
                .map_or_else(|| "unknown".to_owned(), |addr| addr.ip().to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: u64,
    sessions: BTreeMap<SessionId, Session>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its id.
    pub fn register(
        &mut self,
        tx: mpsc::Sender<Outbound>,
        address: Option<SocketAddr>,
        asset_host: String,
    ) -> SessionId {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.sessions.insert(
            id,
            Session {
                id,
                role: None,
                current_page: MAIN_PAGE_ID.to_owned(),
                connected_at: now_rfc3339(),
                address,
                asset_host,
                tx,
            },
        );
        info!(session_id = %id, ?address, sessions = self.sessions.len(), "session registered");
        id
    }

    /// Set the role of a session. Returns `false` if the session is gone.
    pub fn update_role(&mut self, id: SessionId, role: Option<String>) -> bool {
        let Some(session) = self.sessions.get_mut(&id) else {
            return false;
        };
        session.role = role;
        true
    }

    /// Remove a session. Removing an unknown id is a no-op.
    pub fn unregister(&mut self, id: SessionId) -> Option<Session> {
        let removed = self.sessions.remove(&id);
        if removed.is_some() {
            info!(session_id = %id, remaining = self.sessions.len(), "session unregistered");
        }
        removed
    }

    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    #[must_use]
    pub fn role(&self, id: SessionId) -> Option<&str> {
        self.sessions.get(&id)?.role.as_deref()
    }

    /// Summaries of all sessions, optionally leaving one out.
    #[must_use]
    pub fn list(&self, excluding: Option<SessionId>) -> Vec<SessionSummary> {
        self.sessions
            .values()
            .filter(|s| Some(s.id) != excluding)
            .map(Session::summary)
            .collect()
    }

    /// Ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    /// Number of connected devices per team.
    #[must_use]
    pub fn count_by_team(&self) -> BTreeMap<Team, usize> {
        let mut counts: BTreeMap<Team, usize> = Team::ALL.iter().map(|t| (*t, 0)).collect();
        for team in self.sessions.values().filter_map(|s| s.role.as_deref()?.parse::<Team>().ok()) {
            *counts.entry(team).or_default() += 1;
        }
        counts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
