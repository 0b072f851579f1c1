//! The generic repeated-task runner, and the two background workers built
//! on top of it: the timeout reaper and the usage sampler.

pub mod error;
pub mod notifier;
pub mod periodic;
pub mod reaper;
pub mod sampler;

pub mod prelude {
    pub use crate::error::SchedulerError;
    pub use crate::notifier::{LoggingNotifier, Notifier};
    pub use crate::periodic::run_periodic;
    pub use crate::reaper::TimeoutReaper;
    pub use crate::sampler::UsageSampler;
}
