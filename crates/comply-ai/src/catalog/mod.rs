use serde::{Deserialize, Serialize};
use std::fmt;

/// Application (system under assessment) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppId(pub i64);

/// Regulatory standard identifier (e.g. one row per attached framework).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StandardId(pub i64);

/// Control identifier within the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlId(pub i64);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StandardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single compliance requirement from a standard, possibly an enhancement of
/// a parent control (e.g. "AC-2(1)" under "AC-2").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub id: ControlId,
    /// Short name such as "AC-2"; the first two letters are the family code.
    pub name: String,
    pub long_name: String,
    pub text: String,
    pub parent: Option<ControlId>,
    pub order_index: u32,
    pub active: bool,
}

impl Control {
    /// Two-letter family prefix, uppercased ("ac-2" -> "AC").
    pub fn family_code(&self) -> String {
        self.name
            .chars()
            .take(2)
            .collect::<String>()
            .to_ascii_uppercase()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.long_name)
    }
}

/// Errors raised by control catalog lookups.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("standard {0} has no controls attached")]
    EmptyStandard(StandardId),
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Catalog abstraction so the scoring pipeline can be exercised without a
/// database-backed control library.
pub trait ControlCatalog: Send + Sync {
    fn controls_for_standard(&self, standard: StandardId) -> Result<Vec<Control>, CatalogError>;
}
