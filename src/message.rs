//! Message — the JSON wire vocabulary between clients and the server.
//!
//! ARCHITECTURE
//! ============
//! Every WebSocket payload is a flat JSON object discriminated by `type`.
//! Inbound messages are parsed here into [`Inbound`] and lowered to engine
//! [`Event`]s; the engine answers with [`Outbound`] values that the
//! connection task serializes.
//!
//! DESIGN
//! ======
//! - Parsing distinguishes unparseable text, unknown kinds and known kinds
//!   with a bad payload so the transport can log each at the right level.
//! - The client role is spelled `mode` on the wire (`role` is accepted too).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::catalog::PageDefinition;
use crate::services::engine::{Event, ModeratorCommand};

// =============================================================================
// SESSION ID
// =============================================================================

/// Process-unique session identifier. Rendered as `client_{n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client_{}", self.0)
    }
}

impl Serialize for SessionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// INBOUND
// =============================================================================

fn one_point() -> u32 {
    1
}

/// A message sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Connect {
        #[serde(default, alias = "role")]
        mode: Option<String>,
    },
    Reconnect {
        #[serde(default, alias = "role")]
        mode: Option<String>,
    },
    Ping,
    GetClients,
    GridClick {
        row: usize,
        col: usize,
    },
    BuzzerPress,
    TimerFinished,
    MasterAddPoints {
        team: String,
        #[serde(default = "one_point")]
        points: u32,
    },
    MasterRemovePoints {
        team: String,
        #[serde(default = "one_point")]
        points: u32,
    },
    MasterEnableTeam {
        team: String,
    },
    MasterReset,
    NextSlide,
    ReturnToMain,
}

impl Inbound {
    /// Every `type` value the server understands.
    pub const KINDS: [&'static str; 13] = [
        "connect",
        "reconnect",
        "ping",
        "get_clients",
        "grid_click",
        "buzzer_press",
        "timer_finished",
        "master_add_points",
        "master_remove_points",
        "master_enable_team",
        "master_reset",
        "next_slide",
        "return_to_main",
    ];

    /// Lower a wire message to the engine event it triggers.
    #[must_use]
    pub fn into_event(self) -> Event {
        match self {
            Self::Connect { mode } => Event::Connect { role: mode },
            Self::Reconnect { mode } => Event::Reconnect { role: mode },
            Self::Ping => Event::Ping,
            Self::GetClients => Event::ListClients,
            Self::GridClick { row, col } => Event::CellSelected { row, col },
            Self::BuzzerPress => Event::BuzzerPressed,
            Self::TimerFinished => Event::ClientTimerFinished,
            Self::MasterAddPoints { team, points } => {
                Event::Moderator(ModeratorCommand::AddPoints { team, amount: points })
            }
            Self::MasterRemovePoints { team, points } => {
                Event::Moderator(ModeratorCommand::RemovePoints { team, amount: points })
            }
            Self::MasterEnableTeam { team } => Event::Moderator(ModeratorCommand::EnableTeam { team }),
            Self::MasterReset => Event::Moderator(ModeratorCommand::Reset),
            Self::NextSlide => Event::AdvanceSlide,
            Self::ReturnToMain => Event::ReturnToMain,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("invalid json: {0}")]
    Malformed(serde_json::Error),
    #[error("message has no type")]
    MissingType,
    #[error("unknown message type: {0}")]
    UnknownKind(String),
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse one inbound text payload.
///
/// # Errors
///
/// Returns an error if the text is not a JSON object with a known `type`
/// and a payload matching that type.
pub fn parse_inbound(text: &str) -> Result<Inbound, InboundError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(InboundError::Malformed)?;
    let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
        return Err(InboundError::MissingType);
    };
    if !Inbound::KINDS.contains(&kind) {
        return Err(InboundError::UnknownKind(kind.to_owned()));
    }
    let kind = kind.to_owned();
    serde_json::from_value(value).map_err(|source| InboundError::InvalidPayload { kind, source })
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Command telling clients which page to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPage {
    pub page_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_config: Option<PageDefinition>,
    /// Pressed cell keys, only for the main page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressed_buttons: Option<Vec<String>>,
    /// Team allowed to pick a cell, only for the main page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_team: Option<String>,
}

/// One row of a `clients_list` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub client_id: SessionId,
    pub mode: Option<String>,
    pub connected_at: String,
    pub ip: String,
}

/// A message sent to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Welcome { client_id: SessionId, message: String },
    ConnectionConfirmed { mode: Option<String>, client_id: SessionId },
    Config { config: BTreeMap<String, PageDefinition> },
    RenderPage(RenderPage),
    ClientConnected { client_id: SessionId, mode: Option<String> },
    ClientsList { clients: Vec<SessionSummary> },
    Pong { timestamp: String },
}

impl Outbound {
    /// Short name used in log lines.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::ConnectionConfirmed { .. } => "connection_confirmed",
            Self::Config { .. } => "config",
            Self::RenderPage(_) => "render_page",
            Self::ClientConnected { .. } => "client_connected",
            Self::ClientsList { .. } => "clients_list",
            Self::Pong { .. } => "pong",
        }
    }
}

/// Current wall-clock time as an RFC 3339 string.
#[must_use]
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
