use serde::Serialize;

/// The error taxonomy surfaced across the RPC boundary.
///
/// Every crate in this workspace defines its own narrower error enum for the
/// failures it can actually produce, then converts into `ApiError` at the
/// point where a result crosses into the `TopologyService` contract. This
/// keeps e.g. `tomato-elements` free of concerns about HTTP status codes
/// while still giving callers one stable error shape to match against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", content = "message")]
pub enum ApiError {
    /// Permission check failed.
    #[error("denied: {0}")]
    Denied(String),

    /// Id not found.
    #[error("entity does not exist: {0}")]
    EntityDoesNotExist(String),

    /// The per-topology busy latch is held by a concurrent operation.
    #[error("entity busy")]
    EntityBusy,

    /// `modify` saw an unknown, non-`_`-prefixed attribute key.
    #[error("unsupported attribute: {0}")]
    UnsupportedAttribute(String),

    /// A parameter was out of its allowed range or set.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The action was refused because the topology's deadline has passed.
    #[error("timed out")]
    TimedOut,

    /// A non-recursive remove was attempted on a populated topology.
    #[error("not empty")]
    NotEmpty,

    /// A driver/host malfunction or a broken invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The stable string code used in the `{code, message}` wire shape.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Denied(_) => "DENIED",
            ApiError::EntityDoesNotExist(_) => "ENTITY_DOES_NOT_EXIST",
            ApiError::EntityBusy => "ENTITY_BUSY",
            ApiError::UnsupportedAttribute(_) => "UNSUPPORTED_ATTRIBUTE",
            ApiError::InvalidValue(_) => "INVALID_VALUE",
            ApiError::TimedOut => "TIMED_OUT",
            ApiError::NotEmpty => "NOT_EMPTY",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
