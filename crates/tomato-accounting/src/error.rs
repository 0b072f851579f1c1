use tomato_core::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum AccountingError {
    #[error("unknown statistics id")]
    UnknownStatistics,
}

impl From<AccountingError> for ApiError {
    fn from(err: AccountingError) -> Self {
        match err {
            AccountingError::UnknownStatistics => {
                ApiError::EntityDoesNotExist("usage statistics".to_string())
            }
        }
    }
}
