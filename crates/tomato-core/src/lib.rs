//! Core types shared by every crate in the topology control plane:
//! identifiers, the API error taxonomy, configuration, graceful shutdown
//! coordination, and the shared usage-measurement primitive.

pub mod config;
pub mod error;
pub mod ids;
pub mod measurement;
pub mod shutdown;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::ApiError;
    pub use crate::ids::{
        ConnectionId, ElementId, StatisticsId, TopologyId, UsageRecordId,
    };
    pub use crate::measurement::Measurement;
    pub use crate::shutdown::{ShutdownGuard, ShutdownSignal};
}
