use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tomato_core::ids::{ConnectionId, ElementId, StatisticsId, TopologyId};

use crate::element_type::ElementTypeTag;
use crate::state::ElementState;

/// A single element within a topology: a device, interface, or endpoint.
/// Parent/topology/connection links are opaque ids, never pointers — an
/// element is looked up from a topology's element map, not traversed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub topology_id: TopologyId,
    pub typ: ElementTypeTag,
    pub state: ElementState,
    pub parent: Option<ElementId>,
    pub connection: Option<ConnectionId>,
    /// The aggregate's declared default ordering key for this element.
    /// Assigned once at creation and never recomputed, so an
    /// element's position within its type bucket of a compound action stays
    /// stable across renames of other elements.
    pub name: String,
    /// Type-specific attributes plus `last_<metric>` accounting baselines
    /// and any `_`-prefixed free-form client data.
    pub attrs: Map<String, Value>,
    /// Exclusively owned by this element; the sampler
    /// looks up its `UsageStatistics` by this id.
    pub statistics_id: StatisticsId,
    pub created_at: DateTime<Utc>,
}

impl Element {
    pub fn new(topology_id: TopologyId, typ: ElementTypeTag) -> Self {
        let id = ElementId::new();
        Self {
            id,
            topology_id,
            typ,
            state: ElementState::Created,
            parent: None,
            connection: None,
            name: format!("{typ}#{}", &id.to_string()[..8]),
            attrs: Map::new(),
            statistics_id: StatisticsId::new(),
            created_at: Utc::now(),
        }
    }

    pub fn child_of(topology_id: TopologyId, typ: ElementTypeTag, parent: ElementId) -> Self {
        let mut element = Self::new(topology_id, typ);
        element.parent = Some(parent);
        element
    }
}

/// A connection joins exactly two interface-bearing elements that share a
/// connection concept. Like [`Element`], its endpoints are opaque ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub topology_id: TopologyId,
    pub state: ElementState,
    pub element_a: ElementId,
    pub element_b: ElementId,
    pub attrs: Map<String, Value>,
    pub statistics_id: StatisticsId,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(topology_id: TopologyId, element_a: ElementId, element_b: ElementId) -> Self {
        Self {
            id: ConnectionId::new(),
            topology_id,
            state: ElementState::Created,
            element_a,
            element_b,
            attrs: Map::new(),
            statistics_id: StatisticsId::new(),
            created_at: Utc::now(),
        }
    }
}
