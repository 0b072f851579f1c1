//! Shared wiring between the `tomato-daemon` process and the `tomato-cli`
//! operator tool: both load the same [`tomato_core::config::Config`] and
//! build the same [`TopologyService`] on top of the SQLite-backed stores
//! in `tomato-storage`.

use std::sync::Arc;

use tomato_core::config::Config;
use tomato_elements::registry::{AlwaysAvailable, ElementRegistry};
use tomato_storage::{SqliteTopologyStore, SqliteUsageStore};
use tomato_topology::service::TopologyService;

/// Opens (or creates) the SQLite database at `config.storage.db_path` and
/// builds the `TopologyService` on top of it. The registry is built with
/// [`AlwaysAvailable`] — this workspace has no real host-capability probe
/// (host drivers live outside this workspace), so every element type is
/// considered available.
pub async fn build_service(config: &Config) -> anyhow::Result<Arc<TopologyService>> {
    let topology_store = SqliteTopologyStore::new(&config.storage.db_path).await?;
    let usage_store = SqliteUsageStore::new(&config.storage.db_path).await?;
    let registry = ElementRegistry::register_available(&AlwaysAvailable);

    Ok(Arc::new(TopologyService::new(
        Arc::new(topology_store),
        Arc::new(usage_store),
        Arc::new(registry),
        config.timeouts.clone(),
    )))
}
