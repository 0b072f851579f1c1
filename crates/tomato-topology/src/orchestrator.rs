use tomato_core::ids::ElementId;
use tomato_elements::element_type::ElementTypeTag;
use tomato_elements::registry::ElementRegistry;
use tomato_elements::state::{ElementAction, ElementState};

use crate::error::TopologyError;
use crate::topology::Topology;

/// One entry of the compound-action table: what action to apply, the
/// order to walk device types in, the types this action never touches,
/// and the state an element must be in right now to be eligible.
///
/// `state_filter` is re-evaluated against each element's *current* state
/// at the moment it is about to be actioned, not snapshotted up front —
/// an earlier step in the same pass (e.g. preparing a network endpoint)
/// can change what a later element is eligible for, and the orchestrator
/// must see that.
pub struct CompoundAction {
    pub action: ElementAction,
    pub type_order: Vec<ElementTypeTag>,
    pub types_exclude: Vec<ElementTypeTag>,
    pub state_filter: fn(ElementState) -> bool,
}

fn is_created(s: ElementState) -> bool {
    s == ElementState::Created
}
fn is_not_started(s: ElementState) -> bool {
    s != ElementState::Started
}
fn is_started(s: ElementState) -> bool {
    s == ElementState::Started
}
fn is_prepared(s: ElementState) -> bool {
    s == ElementState::Prepared
}

const INTERFACE_TYPES: [ElementTypeTag; 5] = [
    ElementTypeTag::KvmqmInterface,
    ElementTypeTag::OpenvzInterface,
    ElementTypeTag::RepyInterface,
    ElementTypeTag::TincEndpoint,
    ElementTypeTag::ExternalNetworkEndpoint,
];

/// The compound-action table. Each standard action gets its own
/// literal `type_order`, not a reversal of another action's — `prepare` and
/// `start` walk devices in different orders from each other, and so do
/// `stop` and `destroy`.
pub fn spec_for(action: ElementAction) -> CompoundAction {
    use ElementTypeTag::*;

    match action {
        ElementAction::Prepare => CompoundAction {
            action,
            type_order: vec![Kvmqm, Openvz, Repy, TincVpn, UdpEndpoint],
            types_exclude: INTERFACE_TYPES.to_vec(),
            state_filter: is_created,
        },
        ElementAction::Start => CompoundAction {
            action,
            type_order: vec![TincVpn, UdpEndpoint, ExternalNetwork, Kvmqm, Openvz, Repy],
            types_exclude: INTERFACE_TYPES.to_vec(),
            state_filter: is_not_started,
        },
        ElementAction::Stop => CompoundAction {
            action,
            type_order: vec![Kvmqm, Openvz, Repy, TincVpn, UdpEndpoint, ExternalNetwork],
            types_exclude: INTERFACE_TYPES.to_vec(),
            state_filter: is_started,
        },
        ElementAction::Destroy => CompoundAction {
            action,
            type_order: vec![TincVpn, UdpEndpoint, Kvmqm, Openvz, Repy],
            types_exclude: INTERFACE_TYPES.to_vec(),
            state_filter: is_prepared,
        },
        ElementAction::Custom(_) => CompoundAction {
            action,
            type_order: Vec::new(),
            types_exclude: INTERFACE_TYPES.to_vec(),
            state_filter: |_| true,
        },
    }
}

/// Runs one compound action across every eligible element of `topology`,
/// first in `type_order` (ordered pass), then everything else left over
/// (residual pass). Returns the ids actually actioned, in the order they
/// were applied.
pub async fn compound_action(
    topology: &mut Topology,
    registry: &ElementRegistry,
    spec: &CompoundAction,
) -> Result<Vec<ElementId>, TopologyError> {
    let mut actioned = Vec::new();

    for typ in &spec.type_order {
        loop {
            let next = eligible_of_type(topology, *typ, spec.state_filter);
            let Some(id) = next else { break };
            apply_action(topology, registry, id, &spec.action).await?;
            actioned.push(id);
        }
    }

    loop {
        let next = eligible_residual(topology, spec);
        let Some(id) = next else { break };
        apply_action(topology, registry, id, &spec.action).await?;
        actioned.push(id);
    }

    Ok(actioned)
}

fn eligible_of_type(
    topology: &Topology,
    typ: ElementTypeTag,
    filter: fn(ElementState) -> bool,
) -> Option<ElementId> {
    let mut candidates: Vec<(&str, ElementId)> = topology
        .elements
        .values()
        .filter(|e| e.typ == typ && filter(e.state))
        .map(|e| (e.name.as_str(), e.id))
        .collect();
    candidates.sort();
    candidates.into_iter().next().map(|(_, id)| id)
}

fn eligible_residual(topology: &Topology, spec: &CompoundAction) -> Option<ElementId> {
    let mut candidates: Vec<(&str, ElementId)> = topology
        .elements
        .values()
        .filter(|e| {
            !spec.type_order.contains(&e.typ)
                && !spec.types_exclude.contains(&e.typ)
                && (spec.state_filter)(e.state)
        })
        .map(|e| (e.name.as_str(), e.id))
        .collect();
    candidates.sort();
    candidates.into_iter().next().map(|(_, id)| id)
}

async fn apply_action(
    topology: &mut Topology,
    registry: &ElementRegistry,
    id: ElementId,
    action: &ElementAction,
) -> Result<(), TopologyError> {
    let typ = topology
        .elements
        .get(&id)
        .ok_or(TopologyError::ElementNotFound(id))?
        .typ;
    let driver = registry.get(typ).map_err(|e| {
        tomato_elements::error::ElementError::Driver(e.to_string())
    })?;
    let caps = driver.capabilities();

    let element = topology
        .elements
        .get_mut(&id)
        .ok_or(TopologyError::ElementNotFound(id))?;

    if !caps.action_allowed(action, element.state) {
        return Err(tomato_elements::error::ElementError::InvalidAction {
            action: action.clone(),
        }
        .into());
    }

    driver.execute(action, &mut element.attrs).await?;

    if let Some(next) = caps.next_state_for(action) {
        tracing::info!(element = %id, %action, from = %element.state, to = %next, "compound action applied");
        element.state = next;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tomato_core::ids::TopologyId;
    use tomato_elements::model::Element;
    use tomato_elements::registry::{AlwaysAvailable, ElementRegistry};

    fn registry() -> ElementRegistry {
        ElementRegistry::register_available(&AlwaysAvailable)
    }

    #[tokio::test]
    async fn prepare_moves_created_elements_to_prepared() {
        let mut topo = Topology::new(
            crate::permissions::UserId::new("alice"),
            chrono::Utc::now(),
        );
        let topology_id = topo.id;
        let element = Element::new(topology_id, ElementTypeTag::Openvz);
        let id = element.id;
        topo.elements.insert(id, element);

        let reg = registry();
        let spec = spec_for(ElementAction::Prepare);
        let actioned = compound_action(&mut topo, &reg, &spec).await.unwrap();

        assert_eq!(actioned, vec![id]);
        assert_eq!(topo.elements[&id].state, ElementState::Prepared);
    }

    #[tokio::test]
    async fn prepare_skips_elements_already_prepared() {
        let mut topo = Topology::new(
            crate::permissions::UserId::new("alice"),
            chrono::Utc::now(),
        );
        let mut element = Element::new(TopologyId::new(), ElementTypeTag::Repy);
        element.state = ElementState::Prepared;
        let id = element.id;
        topo.elements.insert(id, element);

        let reg = registry();
        let spec = spec_for(ElementAction::Prepare);
        let actioned = compound_action(&mut topo, &reg, &spec).await.unwrap();

        assert!(actioned.is_empty());
        assert_eq!(topo.elements[&id].state, ElementState::Prepared);
    }
}
