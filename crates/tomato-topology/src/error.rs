use tomato_core::error::ApiError;
use tomato_core::ids::{ConnectionId, ElementId, TopologyId};
use tomato_elements::error::ElementError;

use crate::permissions::Role;

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("topology {0} does not exist")]
    NotFound(TopologyId),

    #[error("element {0} does not exist")]
    ElementNotFound(ElementId),

    #[error("connection {0} does not exist")]
    ConnectionNotFound(ConnectionId),

    #[error("user lacks required role {required:?}")]
    Denied { required: Role },

    #[error("topology is busy with a concurrent operation")]
    Busy,

    #[error("topology deadline has passed")]
    TimedOut,

    #[error("topology still contains elements")]
    NotEmpty,

    #[error("unsupported attribute: {0}")]
    UnsupportedAttribute(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Element(#[from] ElementError),
}

impl From<TopologyError> for ApiError {
    fn from(err: TopologyError) -> Self {
        match err {
            TopologyError::NotFound(id) => ApiError::EntityDoesNotExist(format!("topology {id}")),
            TopologyError::ElementNotFound(id) => {
                ApiError::EntityDoesNotExist(format!("element {id}"))
            }
            TopologyError::ConnectionNotFound(id) => {
                ApiError::EntityDoesNotExist(format!("connection {id}"))
            }
            TopologyError::Denied { required } => {
                ApiError::Denied(format!("requires at least {required:?}"))
            }
            TopologyError::Busy => ApiError::EntityBusy,
            TopologyError::TimedOut => ApiError::TimedOut,
            TopologyError::NotEmpty => ApiError::NotEmpty,
            TopologyError::UnsupportedAttribute(a) => ApiError::UnsupportedAttribute(a),
            TopologyError::InvalidValue(v) => ApiError::InvalidValue(v),
            TopologyError::Element(e) => e.into(),
        }
    }
}
