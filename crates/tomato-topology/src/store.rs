use async_trait::async_trait;
use tomato_core::ids::TopologyId;

use crate::error::TopologyError;
use crate::timeout::TimeoutStep;
use crate::topology::Topology;

/// Persistence seam the topology service depends on but does not
/// implement — `tomato-storage` provides the concrete, SQLite-backed
/// version used by the daemon; tests can substitute an in-memory one.
#[async_trait]
pub trait TopologyStore: Send + Sync {
    async fn get(&self, id: TopologyId) -> Result<Topology, TopologyError>;
    async fn save(&self, topology: &Topology) -> Result<(), TopologyError>;
    async fn remove(&self, id: TopologyId) -> Result<(), TopologyError>;
    async fn list(&self) -> Result<Vec<TopologyId>, TopologyError>;

    /// Every topology currently sitting at exactly `step`. The reaper uses
    /// this to run its three escalation sweeps independently instead of
    /// loading and filtering the entire population on every tick.
    ///
    /// A store backed by an indexed query (the
    /// `(timeout, timeout_step)` index) should override this; the default
    /// falls back to a full `list` + `get` scan so implementors can adopt
    /// the trait incrementally.
    async fn list_by_step(&self, step: TimeoutStep) -> Result<Vec<TopologyId>, TopologyError> {
        let mut matching = Vec::new();
        for id in self.list().await? {
            let topology = self.get(id).await?;
            if topology.timeout_step == step {
                matching.push(id);
            }
        }
        Ok(matching)
    }
}
