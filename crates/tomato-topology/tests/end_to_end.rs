//! Literal end-to-end scenarios exercised through `TopologyService` itself
//! rather than through any one module in isolation — the orchestrator,
//! the busy latch, and `remove`'s non-empty guard all have to actually
//! cooperate the way an external caller would see them.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Map;
use tomato_accounting::error::AccountingError;
use tomato_accounting::statistics::UsageStatistics;
use tomato_accounting::store::UsageStore;
use tomato_core::config::TimeoutConfig;
use tomato_core::ids::{StatisticsId, TopologyId};
use tomato_elements::element_type::ElementTypeTag;
use tomato_elements::registry::{AlwaysAvailable, ElementRegistry};
use tomato_elements::state::{ElementAction, ElementState};
use tomato_topology::error::TopologyError;
use tomato_topology::permissions::{Caller, UserId};
use tomato_topology::service::TopologyService;
use tomato_topology::store::TopologyStore;
use tomato_topology::topology::Topology;

struct MemStore {
    topologies: DashMap<TopologyId, Topology>,
}

impl MemStore {
    fn new() -> Self {
        Self {
            topologies: DashMap::new(),
        }
    }
}

#[async_trait]
impl TopologyStore for MemStore {
    async fn get(&self, id: TopologyId) -> Result<Topology, TopologyError> {
        self.topologies
            .get(&id)
            .map(|r| clone_topology(&r))
            .ok_or(TopologyError::NotFound(id))
    }
    async fn save(&self, topology: &Topology) -> Result<(), TopologyError> {
        self.topologies
            .insert(topology.id, clone_topology(topology));
        Ok(())
    }
    async fn remove(&self, id: TopologyId) -> Result<(), TopologyError> {
        self.topologies.remove(&id);
        Ok(())
    }
    async fn list(&self) -> Result<Vec<TopologyId>, TopologyError> {
        Ok(self.topologies.iter().map(|r| *r.key()).collect())
    }
}

fn clone_topology(t: &Topology) -> Topology {
    let bytes = serde_json::to_vec(t).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

struct MemUsageStore {
    stats: DashMap<StatisticsId, UsageStatistics>,
}

impl MemUsageStore {
    fn new() -> Self {
        Self {
            stats: DashMap::new(),
        }
    }
}

#[async_trait]
impl UsageStore for MemUsageStore {
    async fn get(&self, id: StatisticsId) -> Result<UsageStatistics, AccountingError> {
        Ok(self
            .stats
            .get(&id)
            .map(|r| r.clone())
            .unwrap_or_else(|| UsageStatistics::with_id(id)))
    }
    async fn save(&self, stats: &UsageStatistics) -> Result<(), AccountingError> {
        self.stats.insert(stats.id, stats.clone());
        Ok(())
    }
}

fn service() -> Arc<TopologyService> {
    Arc::new(TopologyService::new(
        Arc::new(MemStore::new()),
        Arc::new(MemUsageStore::new()),
        Arc::new(ElementRegistry::register_available(&AlwaysAvailable)),
        TimeoutConfig {
            initial_secs: 3600,
            warning_secs: 1800,
            max_secs: 86_400,
        },
    ))
}

/// Scenario 3: a topology with a kvmqm device, its interface child, and a
/// tinc_vpn device, all freshly created. `action_start` runs an implicit
/// prepare pass before the start pass; both devices end up `started`. The
/// interface is never touched by the orchestrator — its state was fixed
/// at creation time by inheriting its parent's state, not
/// advanced by any compound action — so the topology's `max_state` is
/// what actually reaches `started`, exactly as `state_max` does in the
/// original.
#[tokio::test]
async fn compound_start_from_scratch_reaches_started() {
    let svc = service();
    let owner = UserId::new("alice");
    let id = svc.create(owner.clone()).await.unwrap();
    let caller = Caller::new(owner);

    let kvmqm = svc
        .add_element(id, &caller, ElementTypeTag::Kvmqm, None, Map::new())
        .await
        .unwrap();
    let _interface = svc
        .add_element(
            id,
            &caller,
            ElementTypeTag::KvmqmInterface,
            Some(kvmqm),
            Map::new(),
        )
        .await
        .unwrap();
    let tinc_vpn = svc
        .add_element(id, &caller, ElementTypeTag::TincVpn, None, Map::new())
        .await
        .unwrap();

    let actioned = svc.action(id, &caller, ElementAction::Start).await.unwrap();
    // Both devices get actioned twice: once by the implicit prepare pass,
    // once by the start pass itself.
    assert_eq!(actioned.len(), 4);

    let topo = svc.info(id, &caller).await.unwrap();
    assert_eq!(topo.elements[&kvmqm].state, ElementState::Started);
    assert_eq!(topo.elements[&tinc_vpn].state, ElementState::Started);
    assert_eq!(topo.max_state(), ElementState::Started);
}

/// A driver whose `execute` sleeps before returning, standing in for an
/// element action still in flight against a host. Used to hold a
/// topology's busy latch open long enough for a concurrent call to observe
/// it.
struct SlowDriver {
    inner: ElementTypeTag,
    delay: std::time::Duration,
}

#[async_trait]
impl tomato_elements::driver::ElementDriver for SlowDriver {
    fn capabilities(&self) -> tomato_elements::capability::ElementCapabilities {
        tomato_elements::capability::capabilities_for(self.inner)
    }

    async fn execute(
        &self,
        _action: &ElementAction,
        _attrs: &mut serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), tomato_elements::error::ElementError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn sample_usage(
        &self,
        _attrs: &mut serde_json::Map<String, serde_json::Value>,
    ) -> tomato_core::measurement::Measurement {
        tomato_core::measurement::Measurement::zero()
    }
}

fn service_with_slow_openvz(delay: std::time::Duration) -> Arc<TopologyService> {
    let mut registry = ElementRegistry::new();
    registry
        .register(
            ElementTypeTag::Openvz,
            Arc::new(SlowDriver {
                inner: ElementTypeTag::Openvz,
                delay,
            }),
        )
        .unwrap();
    Arc::new(TopologyService::new(
        Arc::new(MemStore::new()),
        Arc::new(MemUsageStore::new()),
        Arc::new(registry),
        TimeoutConfig {
            initial_secs: 3600,
            warning_secs: 1800,
            max_secs: 86_400,
        },
    ))
}

/// Scenario 4: a concurrent `modify` against a topology whose busy latch
/// is already held by an in-flight compound action is rejected outright
/// rather than queued — even though `modify` loads its own, independently
/// deserialized copy of the topology from the store. The busy latch lives
/// in `TopologyService`, keyed by topology id, precisely so this holds
/// across two calls that never share a `Topology` value.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn busy_rejection_during_compound_action() {
    let svc = service_with_slow_openvz(std::time::Duration::from_millis(100));
    let owner = UserId::new("alice");
    let id = svc.create(owner.clone()).await.unwrap();
    let caller = Caller::new(owner);
    svc.add_element(id, &caller, ElementTypeTag::Openvz, None, Map::new())
        .await
        .unwrap();

    let action_svc = svc.clone();
    let action_caller = caller.clone();
    let action_task = tokio::spawn(async move {
        action_svc
            .action(id, &action_caller, ElementAction::Prepare)
            .await
    });

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let modify_result = svc.modify(id, &caller, Map::new()).await;
    assert!(matches!(modify_result, Err(TopologyError::Busy)));

    action_task.await.unwrap().unwrap();

    // Once the in-flight action has completed, the latch is released and
    // a fresh mutating call succeeds.
    let modify_after = svc.modify(id, &caller, Map::new()).await;
    assert!(modify_after.is_ok());
}

/// Scenario 6: removing a topology that still has elements refuses
/// without `recursive`, but succeeds (cascading the element away with
/// it) once the caller asks for a recursive remove.
#[tokio::test]
async fn remove_refuses_non_empty_unless_recursive() {
    let svc = service();
    let owner = UserId::new("alice");
    let id = svc.create(owner.clone()).await.unwrap();
    let caller = Caller::new(owner);

    svc.add_element(id, &caller, ElementTypeTag::Repy, None, Map::new())
        .await
        .unwrap();

    let err = svc.remove(id, &caller, false).await.unwrap_err();
    assert!(matches!(err, TopologyError::NotEmpty));

    svc.remove(id, &caller, true).await.unwrap();
    let err = svc.info(id, &caller).await.unwrap_err();
    assert!(matches!(err, TopologyError::NotFound(_)));
}
