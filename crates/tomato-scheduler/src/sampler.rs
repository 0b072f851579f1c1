use std::sync::Arc;

use chrono::Utc;
use tomato_core::shutdown::ShutdownSignal;
use tomato_topology::service::TopologyService;

use crate::periodic::run_periodic;

/// The periodic task that ticks every topology's usage accounting once per
/// interval (a 60 s sampler tick per entity). Unlike the reaper's
/// three independent escalation sweeps, a usage tick applies uniformly to
/// every topology regardless of its timeout step — a stopped or even
/// destroyed-but-not-yet-removed topology still gets sampled until its
/// contents are actually gone.
pub struct UsageSampler {
    service: Arc<TopologyService>,
}

impl UsageSampler {
    pub fn new(service: Arc<TopologyService>) -> Self {
        Self { service }
    }

    /// Runs one tick for every known topology, `begin` through `end`
    /// bracketing the tick. A failure sampling one topology is logged and
    /// the sweep continues — one noisy driver must never stall every other
    /// topology's accounting.
    pub async fn run_once(&self, begin: chrono::DateTime<Utc>, end: chrono::DateTime<Utc>) {
        let ids = match self.service.list().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "failed to list topologies for sampler tick");
                return;
            }
        };

        for id in ids {
            if let Err(e) = self.service.sample_tick(id, begin, end).await {
                tracing::warn!(topology = %id, error = %e, "sampler tick failed for topology, continuing");
            }
        }
    }

    /// Runs forever on `interval_secs`, until `shutdown` fires.
    pub async fn run(&self, shutdown: ShutdownSignal, interval_secs: u64) {
        run_periodic(interval_secs, shutdown, || {
            let now = Utc::now();
            let begin = now - chrono::Duration::seconds(interval_secs as i64);
            self.run_once(begin, now)
        })
        .await;
    }
}
