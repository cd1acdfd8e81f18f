//! Score ledger — per-team points and the last buzzer press.
//!
//! The team set is closed. Commands naming any other team are ignored by the
//! caller; nothing here can make a score negative.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// The four competing teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Team {
    #[serde(rename = "team_red")]
    Red,
    #[serde(rename = "team_blue")]
    Blue,
    #[serde(rename = "team_yellow")]
    Yellow,
    #[serde(rename = "team_green")]
    Green,
}

impl Team {
    pub const ALL: [Team; 4] = [Team::Red, Team::Blue, Team::Yellow, Team::Green];

    /// Team that may pick first after a reset.
    pub const DEFAULT_ENABLED: Team = Team::Red;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "team_red",
            Self::Blue => "team_blue",
            Self::Yellow => "team_yellow",
            Self::Green => "team_green",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Blue => 1,
            Self::Yellow => 2,
            Self::Green => 3,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown team: {0}")]
pub struct UnknownTeam(pub String);

impl FromStr for Team {
    type Err = UnknownTeam;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Team::ALL
            .into_iter()
            .find(|team| team.as_str() == s)
            .ok_or_else(|| UnknownTeam(s.to_owned()))
    }
}

/// Label for an optional enabled team; `None` renders as `"none"`.
#[must_use]
pub fn team_label(team: Option<Team>) -> &'static str {
    team.map_or("none", Team::as_str)
}

// =============================================================================
// LEDGER
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreLedger {
    scores: [u32; 4],
    last_buzzer_team: Option<String>,
}

impl ScoreLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn score(&self, team: Team) -> u32 {
        self.scores[team.index()]
    }

    /// Add points and return the new total.
    pub fn add(&mut self, team: Team, amount: u32) -> u32 {
        let slot = &mut self.scores[team.index()];
        *slot = slot.saturating_add(amount);
        *slot
    }

    /// Remove points, flooring at zero, and return the new total.
    pub fn remove(&mut self, team: Team, amount: u32) -> u32 {
        let slot = &mut self.scores[team.index()];
        *slot = slot.saturating_sub(amount);
        *slot
    }

    pub fn record_buzzer(&mut self, role: Option<&str>) {
        self.last_buzzer_team = Some(role.unwrap_or("unknown").to_owned());
    }

    #[must_use]
    pub fn last_buzzer_team(&self) -> Option<&str> {
        self.last_buzzer_team.as_deref()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
#[path = "score_test.rs"]
mod tests;
