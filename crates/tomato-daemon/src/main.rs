use std::sync::Arc;

use anyhow::Context;
use tomato_core::config::Config;
use tomato_core::shutdown::ShutdownSignal;
use tomato_scheduler::notifier::LoggingNotifier;
use tomato_scheduler::reaper::TimeoutReaper;
use tomato_scheduler::sampler::UsageSampler;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tomato_telemetry::init_logging("tomato-daemon", "info");

    let config = Config::load().context("failed to load configuration")?;
    info!(db_path = %config.storage.db_path, "tomato-daemon starting");

    let service = tomato_daemon::build_service(&config)
        .await
        .context("failed to build topology service")?;

    let shutdown = ShutdownSignal::new();

    let reaper = Arc::new(TimeoutReaper::new(
        service.clone(),
        Arc::new(LoggingNotifier),
        config.timeouts.warning_secs,
    ));
    let reaper_shutdown = shutdown.clone();
    let reaper_interval = config.scheduler.reaper_interval_secs;
    let reaper_handle = tokio::spawn(async move {
        reaper.run(reaper_shutdown, reaper_interval).await;
    });

    let sampler = Arc::new(UsageSampler::new(service.clone()));
    let sampler_shutdown = shutdown.clone();
    let sampler_interval = config.scheduler.sampler_interval_secs;
    let sampler_handle = tokio::spawn(async move {
        sampler.run(sampler_shutdown, sampler_interval).await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("ctrl-c received, shutting down");
    shutdown.trigger();

    let _ = tokio::join!(reaper_handle, sampler_handle);
    info!("tomato-daemon stopped");
    Ok(())
}
