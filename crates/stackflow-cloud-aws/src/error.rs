//! AWS API error types

use thiserror::Error;

/// Error returned by an [`AwsApi`](crate::api::AwsApi) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AwsError {
    /// The requested resource does not exist
    #[error("{0} not found")]
    NotFound(String),

    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AwsError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type ApiResult<T> = std::result::Result<T, AwsError>;
