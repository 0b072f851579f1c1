use tomato_core::error::ApiError;

use crate::element_type::ElementTypeTag;
use crate::state::ElementAction;

#[derive(Debug, thiserror::Error)]
pub enum ElementError {
    #[error("unknown element type: {0}")]
    UnknownType(String),

    #[error("action {action} is not valid from the current state")]
    InvalidAction { action: ElementAction },

    #[error("attribute {0} is not supported in the current state")]
    UnsupportedAttribute(String),

    #[error("{child} cannot be created under a {parent} element in its current state")]
    ChildNotAllowed {
        child: ElementTypeTag,
        parent: ElementTypeTag,
    },

    #[error("driver error: {0}")]
    Driver(String),
}

impl From<ElementError> for ApiError {
    fn from(err: ElementError) -> Self {
        match err {
            ElementError::UnknownType(t) => ApiError::InvalidValue(format!("unknown type {t}")),
            ElementError::InvalidAction { action } => {
                ApiError::InvalidValue(format!("invalid action {action}"))
            }
            ElementError::UnsupportedAttribute(a) => ApiError::UnsupportedAttribute(a),
            ElementError::ChildNotAllowed { child, parent } => ApiError::InvalidValue(format!(
                "{child} cannot be created under {parent}"
            )),
            ElementError::Driver(msg) => ApiError::Internal(msg),
        }
    }
}
