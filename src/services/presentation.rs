//! Presentation state — which page is live and the main grid's progress.
//!
//! DESIGN
//! ======
//! The live page id is not stored on its own: it is read from the last
//! transition, so the two can never disagree. Before the first transition the
//! live page is the main page.
//!
//! Pressed cells and the enabled team survive visits to other pages so that
//! returning to the grid restores where the round left off. Only a reset
//! clears them.

use std::collections::BTreeSet;

use crate::catalog::{Catalog, MAIN_PAGE_ID, PageDefinition};
use crate::message::RenderPage;
use crate::services::score::{Team, team_label};

/// A page change as it was broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub page_id: String,
    pub page: Option<PageDefinition>,
}

impl Transition {
    /// Build the transition to `page_id`, attaching its definition.
    #[must_use]
    pub fn to(catalog: &Catalog, page_id: &str) -> Self {
        Self { page_id: page_id.to_owned(), page: catalog.get(page_id).cloned() }
    }
}

/// Snapshot of the main grid state, fixed for the duration of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainPageView {
    pub pressed_buttons: Vec<String>,
    pub enabled_team: &'static str,
}

impl MainPageView {
    /// Attach grid state to a render command if it targets the main page.
    pub fn enrich(&self, render: &mut RenderPage) {
        if render.page_id == MAIN_PAGE_ID {
            render.pressed_buttons = Some(self.pressed_buttons.clone());
            render.enabled_team = Some(self.enabled_team.to_owned());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    last_transition: Option<Transition>,
    pressed_cells: BTreeSet<String>,
    enabled_team: Option<Team>,
}

impl Default for Presentation {
    fn default() -> Self {
        Self::new()
    }
}

impl Presentation {
    #[must_use]
    pub fn new() -> Self {
        Self { last_transition: None, pressed_cells: BTreeSet::new(), enabled_team: Some(Team::DEFAULT_ENABLED) }
    }

    /// Key used for a pressed cell, in client coordinates.
    #[must_use]
    pub fn cell_key(row: usize, col: usize) -> String {
        format!("{row}_{col}")
    }

    #[must_use]
    pub fn current_page_id(&self) -> &str {
        self.last_transition
            .as_ref()
            .map_or(MAIN_PAGE_ID, |t| t.page_id.as_str())
    }

    #[must_use]
    pub fn last_transition(&self) -> Option<&Transition> {
        self.last_transition.as_ref()
    }

    /// Make `transition` the live page.
    pub fn apply(&mut self, transition: Transition) {
        self.last_transition = Some(transition);
    }

    /// Mark a cell as pressed. Returns `false` if it already was.
    pub fn press(&mut self, key: String) -> bool {
        self.pressed_cells.insert(key)
    }

    #[must_use]
    pub fn is_pressed(&self, key: &str) -> bool {
        self.pressed_cells.contains(key)
    }

    #[must_use]
    pub fn pressed_cells(&self) -> &BTreeSet<String> {
        &self.pressed_cells
    }

    #[must_use]
    pub fn enabled_team(&self) -> Option<Team> {
        self.enabled_team
    }

    pub fn set_enabled_team(&mut self, team: Option<Team>) {
        self.enabled_team = team;
    }

    /// Clear grid progress and hand the turn back to the default team.
    /// The live page is left to the caller, which broadcasts the change.
    pub fn reset(&mut self) {
        self.pressed_cells.clear();
        self.enabled_team = Some(Team::DEFAULT_ENABLED);
    }

    #[must_use]
    pub fn main_view(&self) -> MainPageView {
        MainPageView {
            pressed_buttons: self.pressed_cells.iter().cloned().collect(),
            enabled_team: team_label(self.enabled_team),
        }
    }

    /// Render command for a transition, with grid state if it is the main page.
    #[must_use]
    pub fn render(&self, transition: &Transition) -> RenderPage {
        let mut render = RenderPage {
            page_id: transition.page_id.clone(),
            page_config: transition.page.clone(),
            pressed_buttons: None,
            enabled_team: None,
        };
        self.main_view().enrich(&mut render);
        render
    }

    /// What a client should be showing right now. Before any transition this
    /// is a synthesized main page.
    #[must_use]
    pub fn render_current(&self, catalog: &Catalog) -> RenderPage {
        match &self.last_transition {
            Some(transition) => self.render(transition),
            None => self.render(&Transition::to(catalog, MAIN_PAGE_ID)),
        }
    }
}

#[cfg(test)]
#[path = "presentation_test.rs"]
mod tests;
