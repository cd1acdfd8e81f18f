//! Page catalog — the immutable set of pages an event can show.
//!
//! DESIGN
//! ======
//! The catalog is authored as a JSONC file keyed by page id. Each page has a
//! `type` plus kind-specific fields (`table` for the main grid, `time` and
//! `link` for timers, `link` for buzzer and plain pages, `image` for image
//! pages). Fields the server does not interpret are kept verbatim and handed
//! to clients untouched, so display-only authoring never needs a server change.
//!
//! GRID ORIENTATION
//! ================
//! `table` is column-major: `table[col][row]`. Clients report clicks as
//! `(row, col)`, so every lookup goes through [`PageDefinition::cell_at`],
//! which owns the axis swap.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Page id of the main grid page.
pub const MAIN_PAGE_ID: &str = "0";

/// Prefixes that mark an image reference as already resolvable by clients.
const REMOTE_IMAGE_PREFIXES: [&str; 3] = ["http://", "https://", "data:"];

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog syntax: {0}")]
    Syntax(#[from] json5::Error),
    #[error("invalid catalog structure: {0}")]
    Structure(#[from] serde_json::Error),
}

// =============================================================================
// PAGE TYPES
// =============================================================================

/// What a page is, as far as transitions are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PageKind {
    /// The clickable grid (normally page `"0"`).
    Main,
    Image,
    /// Counts down `time` seconds, then follows `link`.
    Timer,
    /// Target of a buzzer press; follows its own `link`.
    Buzzer,
    /// Anything else. Keeps the authored spelling for clients.
    Other(String),
    /// No `type` given.
    #[default]
    Unset,
}

impl PageKind {
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl From<String> for PageKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "main" => Self::Main,
            "image" => Self::Image,
            "timer" => Self::Timer,
            "buzzer" => Self::Buzzer,
            "" => Self::Unset,
            _ => Self::Other(raw),
        }
    }
}

impl From<PageKind> for String {
    fn from(kind: PageKind) -> Self {
        match kind {
            PageKind::Main => "main".into(),
            PageKind::Image => "image".into(),
            PageKind::Timer => "timer".into(),
            PageKind::Buzzer => "buzzer".into(),
            PageKind::Other(raw) => raw,
            PageKind::Unset => String::new(),
        }
    }
}

/// One cell of the main grid.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default, deserialize_with = "page_ref", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Authored definition of a single page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "PageKind::is_unset")]
    pub kind: PageKind,
    /// Column-major grid, only meaningful for [`PageKind::Main`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table: Vec<Vec<Cell>>,
    #[serde(default, deserialize_with = "page_ref", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Countdown length in seconds for timer pages.
    #[serde(default, deserialize_with = "seconds", skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PageDefinition {
    /// Look up the cell a client reported as `(row, col)`.
    ///
    /// The table is stored column-major, so this reads `table[col][row]`.
    #[must_use]
    pub fn cell_at(&self, row: usize, col: usize) -> Option<&Cell> {
        self.table.get(col)?.get(row)
    }

    /// Countdown for a timer page. `None` for non-timer pages and for
    /// durations that are zero, negative, not finite or too long to represent.
    #[must_use]
    pub fn countdown(&self) -> Option<Duration> {
        if self.kind != PageKind::Timer {
            return None;
        }
        let secs = self.time?;
        if !secs.is_finite() || secs <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(secs).ok()
    }

    /// Copy of this page with a local `image` path rewritten to a URL under
    /// `http://{host}/static/`.
    #[must_use]
    pub fn for_host(&self, host: &str) -> Self {
        let mut page = self.clone();
        if page.kind != PageKind::Image {
            return page;
        }
        if let Some(image) = &page.image {
            if !REMOTE_IMAGE_PREFIXES.iter().any(|p| image.starts_with(p)) {
                let path = image.trim_start_matches('/');
                page.image = Some(format!("http://{host}/static/{path}"));
            }
        }
        page
    }
}

// =============================================================================
// LENIENT FIELDS
// =============================================================================

// A mistyped field drops that field only, never the whole catalog.

/// Page reference: a string id, or a number written for a numeric id.
fn page_ref<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(numeric_id(&id)),
        Some(other) => {
            warn!(link = %other, "ignoring link that is not a page id");
            None
        }
    })
}

/// `2` and `2.0` both name page `"2"`.
fn numeric_id(id: &serde_json::Number) -> String {
    match (id.as_i64(), id.as_f64()) {
        (Some(n), _) => n.to_string(),
        (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
        _ => id.to_string(),
    }
}

/// Countdown seconds: a number, or a numeric string.
fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::Number(secs)) => secs.as_f64(),
        Some(Value::String(raw)) => match raw.trim().parse() {
            Ok(secs) => Some(secs),
            Err(_) => {
                warn!(time = %raw, "ignoring timer length that is not a number");
                None
            }
        },
        Some(other) => {
            warn!(time = %other, "ignoring timer length that is not a number");
            None
        }
    })
}

// =============================================================================
// CATALOG
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pages: BTreeMap<String, PageDefinition>,
}

impl Catalog {
    /// Read and parse a JSONC catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid catalog.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| CatalogError::Read { path: path.display().to_string(), source })?;
        Self::parse(&raw)
    }

    /// Parse catalog text. Accepts JSON with comments and trailing commas.
    ///
    /// # Errors
    ///
    /// Returns an error on a syntax error or when a page has the wrong shape.
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value = json5::from_str(raw)?;
        Ok(serde_json::from_value(value)?)
    }

    #[must_use]
    pub fn get(&self, page_id: &str) -> Option<&PageDefinition> {
        self.pages.get(page_id)
    }

    /// Whether `page_id` may be shown. The main page is always showable,
    /// even when the catalog does not define it.
    #[must_use]
    pub fn is_known(&self, page_id: &str) -> bool {
        page_id == MAIN_PAGE_ID || self.pages.contains_key(page_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Snapshot of every page as seen from a client reaching the server via
    /// `host`, with local image paths turned into fetchable URLs.
    #[must_use]
    pub fn snapshot_for(&self, host: &str) -> BTreeMap<String, PageDefinition> {
        self.pages
            .iter()
            .map(|(id, page)| (id.clone(), page.for_host(host)))
            .collect()
    }
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
