//! Broadcast dispatcher — fan-out of engine output to sessions.
//!
//! DESIGN
//! ======
//! Handlers never send. They return an [`Outcome`] listing who gets what,
//! and [`deliver`] applies it against the session registry.
//!
//! Every send is a `try_send` into the recipient's bounded queue, so a slow
//! client can only ever hurt itself. A closed or full queue evicts that
//! session; delivery to everyone else continues.
//!
//! Render commands for the main page are completed per recipient with the
//! grid view captured at the start of the delivery.

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::message::{Outbound, SessionId};
use crate::services::presentation::MainPageView;
use crate::services::session::SessionRegistry;

// =============================================================================
// OUTCOME
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    One(SessionId),
    AllExcept(SessionId),
    All,
}

impl Audience {
    fn includes(self, id: SessionId) -> bool {
        match self {
            Self::One(target) => target == id,
            Self::AllExcept(excluded) => excluded != id,
            Self::All => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub audience: Audience,
    pub message: Outbound,
}

/// Messages produced by handling one event, in send order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub deliveries: Vec<Delivery>,
}

impl Outcome {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    pub fn send_to(&mut self, id: SessionId, message: Outbound) {
        self.deliveries.push(Delivery { audience: Audience::One(id), message });
    }

    pub fn send_to_all_except(&mut self, id: SessionId, message: Outbound) {
        self.deliveries.push(Delivery { audience: Audience::AllExcept(id), message });
    }

    pub fn send_to_all(&mut self, message: Outbound) {
        self.deliveries.push(Delivery { audience: Audience::All, message });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    /// Messages addressed to everyone.
    pub fn broadcasts(&self) -> impl Iterator<Item = &Outbound> {
        self.deliveries
            .iter()
            .filter(|d| d.audience == Audience::All)
            .map(|d| &d.message)
    }
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Apply an outcome. Returns the ids evicted because their queue was closed
/// or full.
pub fn deliver(sessions: &mut SessionRegistry, view: &MainPageView, outcome: Outcome) -> Vec<SessionId> {
    let mut evicted = Vec::new();

    for delivery in outcome.deliveries {
        for id in sessions.ids() {
            if !delivery.audience.includes(id) || evicted.contains(&id) {
                continue;
            }
            let Some(session) = sessions.get_mut(id) else {
                continue;
            };

            let mut message = delivery.message.clone();
            if let Outbound::RenderPage(render) = &mut message {
                view.enrich(render);
                session.current_page.clone_from(&render.page_id);
            }

            let kind = message.kind();
            match session.tx.try_send(message) {
                Ok(()) => debug!(session_id = %id, kind, "queued message"),
                Err(TrySendError::Full(_)) => {
                    warn!(session_id = %id, kind, "outbound queue full, evicting session");
                    evicted.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(session_id = %id, kind, "outbound queue closed, evicting session");
                    evicted.push(id);
                }
            }
        }
    }

    for id in &evicted {
        sessions.unregister(*id);
    }
    evicted
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
