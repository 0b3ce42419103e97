//! Outcome of a single task run

use serde::{Deserialize, Serialize};

/// What a task did to converge its object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// A new object was created
    Created,
    /// An existing object drifted and was patched
    Updated,
    /// The object already matched
    Unchanged,
    /// A pre-existing object was resolved or adopted
    Found,
}

impl Action {
    /// Whether the task wrote to the control plane
    pub fn is_change(&self) -> bool {
        matches!(self, Action::Created | Action::Updated)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Created => write!(f, "created"),
            Action::Updated => write!(f, "updated"),
            Action::Unchanged => write!(f, "unchanged"),
            Action::Found => write!(f, "found"),
        }
    }
}
