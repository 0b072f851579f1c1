use async_trait::async_trait;
use tomato_core::ids::TopologyId;
use tomato_topology::permissions::UserId;

/// The out-of-scope e-mail notifier the reaper's warn sweep calls — the
/// e-mail transport is an external collaborator this workspace depends on
/// but does not implement real delivery for.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_timeout_warning(&self, topology: TopologyId, managers: &[UserId]);
}

/// Logs the warning instead of sending it — used wherever no real
/// notifier is wired in (tests, and any deployment that hasn't configured
/// one yet).
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_timeout_warning(&self, topology: TopologyId, managers: &[UserId]) {
        tracing::info!(
            topology = %topology,
            managers = managers.len(),
            "topology timeout warning (no notifier configured, logging only)"
        );
    }
}
