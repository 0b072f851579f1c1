use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of an element or connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementState {
    Created,
    Prepared,
    Started,
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementState::Created => "created",
            ElementState::Prepared => "prepared",
            ElementState::Started => "started",
        };
        write!(f, "{s}")
    }
}

/// An action an element can be asked to perform.
///
/// `Remove` is not a driver action — no type ever lists it in its
/// `CAP_ACTIONS` table — but every element accepts it as a pseudo-action
/// that tears the element down entirely rather than moving it between
/// `Created`/`Prepared`/`Started`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementAction {
    Prepare,
    Destroy,
    Start,
    Stop,
    Custom(String),
}

impl fmt::Display for ElementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementAction::Prepare => write!(f, "prepare"),
            ElementAction::Destroy => write!(f, "destroy"),
            ElementAction::Start => write!(f, "start"),
            ElementAction::Stop => write!(f, "stop"),
            ElementAction::Custom(name) => write!(f, "{name}"),
        }
    }
}

