use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tomato_core::ids::{ConnectionId, ElementId, StatisticsId, TopologyId};
use tomato_elements::model::{Connection, Element};
use tomato_elements::state::ElementState;

use crate::permissions::{Permissions, UserId};
use crate::timeout::TimeoutStep;

/// The root aggregate: a topology's elements, connections, permissions,
/// and timeout deadline. Elements and connections are owned here rather
/// than referenced, so a `Topology` is the unit of persistence — exactly
/// the unit `tomato-storage` loads and saves.
///
/// The busy latch deliberately does not live on this struct: a document
/// store hands back a fresh deserialized `Topology` on every `get`, so a
/// latch carried on the value itself would never be shared between two
/// concurrent callers loading the same id. `TopologyService` keeps the
/// latch in a process-local registry keyed by [`TopologyId`] instead — see
/// `TopologyService::acquire_busy`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Topology {
    pub id: TopologyId,
    pub name: String,
    pub permissions: Permissions,
    pub statistics_id: StatisticsId,
    pub timeout: DateTime<Utc>,
    pub timeout_step: TimeoutStep,
    pub site: Option<String>,
    pub client_data: Map<String, Value>,
    pub elements: HashMap<ElementId, Element>,
    pub connections: HashMap<ConnectionId, Connection>,
}

impl Topology {
    pub fn new(owner: UserId, initial_timeout: DateTime<Utc>) -> Self {
        let id = TopologyId::new();
        Self {
            name: format!("Topology [{id}]"),
            id,
            permissions: Permissions::owned_by(owner),
            statistics_id: StatisticsId::new(),
            timeout: initial_timeout,
            // No warning is owed for the initial grace period, so a fresh
            // topology starts already past the "warn" step.
            timeout_step: TimeoutStep::Warned,
            site: None,
            client_data: Map::new(),
            elements: HashMap::new(),
            connections: HashMap::new(),
        }
    }

    /// The highest element state reached by any element in the topology,
    /// used to decide whether the topology as a whole looks "started".
    pub fn max_state(&self) -> ElementState {
        self.elements
            .values()
            .map(|e| e.state)
            .max_by_key(|s| match s {
                ElementState::Created => 0,
                ElementState::Prepared => 1,
                ElementState::Started => 2,
            })
            .unwrap_or(ElementState::Created)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.connections.is_empty()
    }
}
