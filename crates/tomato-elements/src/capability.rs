use std::collections::HashMap;

use crate::element_type::{ConnectionConcept, ElementTypeTag};
use crate::state::{ElementAction, ElementState};

/// The capability tables for one element type, looked up once at registry
/// build time and then consulted on every action/attribute check. Modeling
/// these as data rather than as branches in the orchestrator means adding a
/// type is adding a table, not touching the machinery that walks it.
#[derive(Debug, Clone)]
pub struct ElementCapabilities {
    /// `action -> states it may be invoked from`.
    pub actions: HashMap<ElementAction, Vec<ElementState>>,
    /// `action -> state reached on success`.
    pub next_state: HashMap<ElementAction, ElementState>,
    /// `attribute name -> states in which it may be set`. An attribute
    /// missing from this table is rejected as `UnsupportedAttribute`
    /// unless its name starts with `_` (free-form client data, always
    /// accepted in any state).
    pub attrs: HashMap<String, Vec<ElementState>>,
    /// `child type -> parent states in which that child may be created`.
    pub children: HashMap<ElementTypeTag, Vec<ElementState>>,
    /// Parent types this type may be created under. Empty means the type
    /// is only ever created top-level within a topology.
    pub parents: Vec<ElementTypeTag>,
    /// The connection concept this type's interfaces speak, if any.
    pub con_concept: Option<ConnectionConcept>,
    /// States `REMOVE_ACTION` may be invoked from. A device
    /// element must be torn all the way down to `Created` before it can be
    /// removed outright; an interface is slaved to its parent's lifecycle
    /// and is removable from any state since the parent's own removal (or
    /// a connection teardown) is what actually triggers it.
    pub remove_from: Vec<ElementState>,
}

impl ElementCapabilities {
    pub fn action_allowed(&self, action: &ElementAction, from: ElementState) -> bool {
        self.actions
            .get(action)
            .is_some_and(|states| states.contains(&from))
    }

    pub fn next_state_for(&self, action: &ElementAction) -> Option<ElementState> {
        self.next_state.get(action).copied()
    }

    pub fn attr_allowed(&self, name: &str, state: ElementState) -> bool {
        if name.starts_with('_') {
            return true;
        }
        self.attrs
            .get(name)
            .is_some_and(|states| states.contains(&state))
    }

    pub fn remove_allowed(&self, from: ElementState) -> bool {
        self.remove_from.contains(&from)
    }
}

fn device_capabilities(attrs: &[&str]) -> ElementCapabilities {
    use ElementAction::*;
    use ElementState::*;

    ElementCapabilities {
        actions: HashMap::from([
            (Prepare, vec![Created]),
            (Destroy, vec![Prepared]),
            (Start, vec![Prepared]),
            (Stop, vec![Started]),
        ]),
        next_state: HashMap::from([
            (Prepare, Prepared),
            (Destroy, Created),
            (Start, Started),
            (Stop, Prepared),
        ]),
        attrs: attrs
            .iter()
            .map(|a| (a.to_string(), vec![Created, Prepared]))
            .collect(),
        children: HashMap::new(),
        parents: Vec::new(),
        con_concept: None,
        remove_from: vec![Created],
    }
}

fn interface_capabilities(parent: ElementTypeTag, concept: ConnectionConcept) -> ElementCapabilities {
    use ElementState::*;

    ElementCapabilities {
        actions: HashMap::new(),
        next_state: HashMap::new(),
        attrs: HashMap::from([("ip4address".to_string(), vec![Created, Prepared])]),
        children: HashMap::new(),
        parents: vec![parent],
        con_concept: Some(concept),
        remove_from: vec![Created, Prepared, Started],
    }
}

/// The capability table for `typ`, built the same way every time a
/// registry looks it up.
pub fn capabilities_for(typ: ElementTypeTag) -> ElementCapabilities {
    use ElementTypeTag::*;

    match typ {
        Kvmqm => {
            let mut caps = device_capabilities(&["cpus", "ram", "template"]);
            caps.children
                .insert(KvmqmInterface, vec![ElementState::Created, ElementState::Prepared]);
            caps
        }
        KvmqmInterface => interface_capabilities(Kvmqm, ConnectionConcept::Bridge),

        Openvz => {
            let mut caps = device_capabilities(&["ram", "diskspace", "rootpassword", "template"]);
            caps.children
                .insert(OpenvzInterface, vec![ElementState::Created, ElementState::Prepared]);
            caps
        }
        OpenvzInterface => interface_capabilities(Openvz, ConnectionConcept::Bridge),

        Repy => {
            let mut caps = device_capabilities(&["cpu", "memory", "filesystem"]);
            caps.children
                .insert(RepyInterface, vec![ElementState::Created, ElementState::Prepared]);
            caps
        }
        RepyInterface => interface_capabilities(Repy, ConnectionConcept::Bridge),

        TincVpn => {
            let mut caps = device_capabilities(&[]);
            caps.children
                .insert(TincEndpoint, vec![ElementState::Created, ElementState::Prepared, ElementState::Started]);
            caps
        }
        TincEndpoint => interface_capabilities(TincVpn, ConnectionConcept::Tinc),

        UdpEndpoint => {
            let mut caps = device_capabilities(&["gateway4", "peer_address", "peer_port"]);
            caps.con_concept = Some(ConnectionConcept::Bridge);
            caps
        }

        ExternalNetwork => {
            let mut caps = device_capabilities(&["kind"]);
            caps.children.insert(
                ExternalNetworkEndpoint,
                vec![ElementState::Created, ElementState::Prepared],
            );
            caps
        }
        ExternalNetworkEndpoint => interface_capabilities(ExternalNetwork, ConnectionConcept::Bridge),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_prepare_only_allowed_from_created() {
        let caps = capabilities_for(ElementTypeTag::Openvz);
        assert!(caps.action_allowed(&ElementAction::Prepare, ElementState::Created));
        assert!(!caps.action_allowed(&ElementAction::Prepare, ElementState::Prepared));
    }

    #[test]
    fn interface_types_declare_their_parent() {
        let caps = capabilities_for(ElementTypeTag::OpenvzInterface);
        assert_eq!(caps.parents, vec![ElementTypeTag::Openvz]);
        assert_eq!(caps.con_concept, Some(ConnectionConcept::Bridge));
    }

    #[test]
    fn underscore_attrs_are_always_allowed() {
        let caps = capabilities_for(ElementTypeTag::Repy);
        assert!(caps.attr_allowed("_comment", ElementState::Started));
    }

    #[test]
    fn unknown_attr_is_rejected() {
        let caps = capabilities_for(ElementTypeTag::Repy);
        assert!(!caps.attr_allowed("bogus", ElementState::Created));
    }

    #[test]
    fn device_only_removable_once_back_at_created() {
        let caps = capabilities_for(ElementTypeTag::Kvmqm);
        assert!(caps.remove_allowed(ElementState::Created));
        assert!(!caps.remove_allowed(ElementState::Prepared));
        assert!(!caps.remove_allowed(ElementState::Started));
    }

    #[test]
    fn interface_removable_from_any_state() {
        let caps = capabilities_for(ElementTypeTag::TincEndpoint);
        assert!(caps.remove_allowed(ElementState::Started));
    }
}
