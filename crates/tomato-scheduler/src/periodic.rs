use std::future::Future;
use std::time::Duration;

use tomato_core::shutdown::ShutdownSignal;

/// Runs `tick` on a fixed interval until `shutdown` fires, mirroring the
/// interval-plus-select loop every background worker in this workspace
/// uses. The first tick is consumed immediately so the reaper and the
/// sampler don't both fire at process start.
pub async fn run_periodic<F, Fut>(interval_secs: u64, shutdown: ShutdownSignal, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await;

    let mut shutdown_rx = shutdown.subscribe();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick().await;
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("periodic task received shutdown signal");
                break;
            }
        }
    }
}
