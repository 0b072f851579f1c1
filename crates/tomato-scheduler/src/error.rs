use tomato_core::error::ApiError;
use tomato_topology::error::TopologyError;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Topology(e) => e.into(),
        }
    }
}
