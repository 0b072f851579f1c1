use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tomato_core::ids::TopologyId;
use tomato_core::shutdown::ShutdownSignal;
use tomato_elements::state::ElementAction;
use tomato_topology::error::TopologyError;
use tomato_topology::permissions::{Caller, Role, UserId};
use tomato_topology::service::TopologyService;
use tomato_topology::timeout::TimeoutStep;

use crate::notifier::Notifier;
use crate::periodic::run_periodic;

const REAPER_IDENTITY: &str = "reaper";

/// The periodic task that advances idle topologies through
/// `INITIAL → WARNED → STOPPED → DESTROYED`. Each tick runs
/// three independent sweeps, one per step; a failure on one topology is
/// logged and the sweep moves on rather than aborting the tick.
pub struct TimeoutReaper {
    service: Arc<TopologyService>,
    notifier: Arc<dyn Notifier>,
    warning_secs: i64,
}

impl TimeoutReaper {
    pub fn new(service: Arc<TopologyService>, notifier: Arc<dyn Notifier>, warning_secs: u64) -> Self {
        Self {
            service,
            notifier,
            warning_secs: warning_secs as i64,
        }
    }

    fn admin_caller() -> Caller {
        Caller::global_admin(UserId::new(REAPER_IDENTITY))
    }

    /// Runs all three sweeps once, at `now`. Each sweep lists its own step
    /// independently and tolerates per-topology failures (log and
    /// continue) so a stuck topology never blocks the others.
    pub async fn run_once(&self, now: DateTime<Utc>) {
        self.warn_sweep(now).await;
        self.stop_sweep(now).await;
        self.destroy_sweep(now).await;
    }

    async fn warn_sweep(&self, now: DateTime<Utc>) {
        let ids = match self.service.list_by_step(TimeoutStep::Initial).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "failed to list initial-step topologies");
                return;
            }
        };
        for id in ids {
            if let Err(e) = self.warn_one(id, now).await {
                tracing::warn!(topology = %id, error = %e, "warn sweep failed for topology, continuing");
            }
        }
    }

    async fn stop_sweep(&self, now: DateTime<Utc>) {
        let ids = match self.service.list_by_step(TimeoutStep::Warned).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "failed to list warned-step topologies");
                return;
            }
        };
        for id in ids {
            if let Err(e) = self.stop_one(id, now).await {
                tracing::warn!(topology = %id, error = %e, "stop sweep failed for topology, continuing");
            }
        }
    }

    async fn destroy_sweep(&self, now: DateTime<Utc>) {
        let ids = match self.service.list_by_step(TimeoutStep::Stopped).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "failed to list stopped-step topologies");
                return;
            }
        };
        for id in ids {
            if let Err(e) = self.destroy_one(id, now).await {
                tracing::warn!(topology = %id, error = %e, "destroy sweep failed for topology, continuing");
            }
        }
    }

    /// Step 1: `INITIAL` topologies whose deadline is within the warning
    /// lead time get a warning mailed to their managers+ and advance to
    /// `WARNED`.
    async fn warn_one(&self, id: TopologyId, now: DateTime<Utc>) -> Result<(), TopologyError> {
        let caller = Self::admin_caller();
        let topology = self.service.info(id, &caller).await?;
        if topology.timeout > now + Duration::seconds(self.warning_secs) {
            return Ok(());
        }

        let managers: Vec<UserId> = topology
            .permissions
            .grants()
            .filter(|(_, role)| **role >= Role::Manager)
            .map(|(user, _)| user.clone())
            .collect();
        self.notifier.notify_timeout_warning(id, &managers).await;

        self.service.advance_timeout_step(id, TimeoutStep::Warned).await?;
        tracing::info!(topology = %id, "reaper sent timeout warning");
        Ok(())
    }

    /// Step 2: `WARNED` topologies past their deadline get stopped and
    /// advance to `STOPPED`.
    async fn stop_one(&self, id: TopologyId, now: DateTime<Utc>) -> Result<(), TopologyError> {
        let caller = Self::admin_caller();
        let topology = self.service.info(id, &caller).await?;
        if topology.timeout > now {
            return Ok(());
        }

        self.service.action(id, &caller, ElementAction::Stop).await?;
        self.service.advance_timeout_step(id, TimeoutStep::Stopped).await?;
        tracing::info!(topology = %id, "reaper stopped idle topology");
        Ok(())
    }

    /// Step 3: `STOPPED` topologies whose deadline passed a further
    /// warning-lead-time ago get destroyed and advance to `DESTROYED` —
    /// equal notice before the stop and before the permanent data loss.
    async fn destroy_one(&self, id: TopologyId, now: DateTime<Utc>) -> Result<(), TopologyError> {
        let caller = Self::admin_caller();
        let topology = self.service.info(id, &caller).await?;
        if topology.timeout > now - Duration::seconds(self.warning_secs) {
            return Ok(());
        }

        self.service.action(id, &caller, ElementAction::Destroy).await?;
        self.service
            .advance_timeout_step(id, TimeoutStep::Destroyed)
            .await?;
        tracing::info!(topology = %id, "reaper destroyed idle topology");
        Ok(())
    }

    /// Runs forever on `interval_secs`, until `shutdown` fires.
    pub async fn run(&self, shutdown: ShutdownSignal, interval_secs: u64) {
        run_periodic(interval_secs, shutdown, || self.run_once(Utc::now())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::sync::Mutex;
    use tomato_accounting::error::AccountingError;
    use tomato_accounting::statistics::UsageStatistics;
    use tomato_accounting::store::UsageStore;
    use tomato_core::config::TimeoutConfig;
    use tomato_core::ids::StatisticsId;
    use tomato_elements::registry::{AlwaysAvailable, ElementRegistry};
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

    struct MemUsageStore;

    #[async_trait]
    impl UsageStore for MemUsageStore {
        async fn get(&self, id: StatisticsId) -> Result<UsageStatistics, AccountingError> {
            Ok(UsageStatistics::with_id(id))
        }
        async fn save(&self, _stats: &UsageStatistics) -> Result<(), AccountingError> {
            Ok(())
        }
    }

    struct RecordingNotifier {
        calls: Mutex<Vec<TopologyId>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify_timeout_warning(&self, topology: TopologyId, _managers: &[UserId]) {
            self.calls.lock().unwrap().push(topology);
        }
    }

    fn service() -> Arc<TopologyService> {
        Arc::new(TopologyService::new(
            Arc::new(MemStore::new()),
            Arc::new(MemUsageStore),
            Arc::new(ElementRegistry::register_available(&AlwaysAvailable)),
            TimeoutConfig {
                initial_secs: 3600,
                warning_secs: 1800,
                max_secs: 86_400,
            },
        ))
    }

    /// Literal end-to-end scenario 1: a fresh topology starts already at
    /// `WARNED` (no warning is owed for the initial grace), so the reaper
    /// only ever has a stop and a destroy step left to walk it through.
    #[tokio::test]
    async fn initial_timeout_walks_through_stop_and_destroy() {
        let svc = service();
        let owner = UserId::new("alice");
        let id = svc.create(owner.clone()).await.unwrap();
        let caller = Caller::new(owner);

        let notifier = Arc::new(RecordingNotifier::new());
        let reaper = TimeoutReaper::new(svc.clone(), notifier.clone(), 1800);

        let t0 = Utc::now();
        reaper.run_once(t0 + Duration::seconds(1801)).await;
        let topo = svc.info(id, &caller).await.unwrap();
        assert_eq!(topo.timeout_step, TimeoutStep::Warned);

        reaper.run_once(t0 + Duration::seconds(3601)).await;
        let topo = svc.info(id, &caller).await.unwrap();
        assert_eq!(topo.timeout_step, TimeoutStep::Stopped);

        reaper.run_once(t0 + Duration::seconds(5401)).await;
        let topo = svc.info(id, &caller).await.unwrap();
        assert_eq!(topo.timeout_step, TimeoutStep::Destroyed);
        assert!(notifier.calls.lock().unwrap().is_empty());
    }

    /// A topology reset to `INITIAL` by a long `renew` gets a warning
    /// mailed to its managers+ once its deadline enters the lead window.
    #[tokio::test]
    async fn renewed_topology_is_warned_within_the_lead_time() {
        let svc = service();
        let owner = UserId::new("alice");
        let id = svc.create(owner.clone()).await.unwrap();
        let caller = Caller::new(owner);
        svc.renew(id, &caller, 7200).await.unwrap();
        let topo = svc.info(id, &caller).await.unwrap();
        assert_eq!(topo.timeout_step, TimeoutStep::Initial);

        let notifier = Arc::new(RecordingNotifier::new());
        let reaper = TimeoutReaper::new(svc.clone(), notifier.clone(), 1800);
        reaper.run_once(topo.timeout - Duration::seconds(1)).await;

        let topo = svc.info(id, &caller).await.unwrap();
        assert_eq!(topo.timeout_step, TimeoutStep::Warned);
        assert_eq!(*notifier.calls.lock().unwrap(), vec![id]);
    }
}
