use thiserror::Error;

use tracker_auth::PasswordPolicyError;
use tracker_core::ApiError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Durable token storage could not be read or written.
    #[error("token storage failed: {0:#}")]
    Storage(anyhow::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    PasswordPolicy(#[from] PasswordPolicyError),
}

impl SessionError {
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}
