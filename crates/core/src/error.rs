//! Request-layer error model.

use thiserror::Error;

/// Result type returned by every remote call.
pub type ApiResult<T> = Result<T, ApiError>;

/// Classified failure of a remote call.
///
/// Every transport, HTTP and envelope failure maps onto exactly one variant so
/// callers can decide between "sign out", "tell the user" and "ignore".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The remote authority rejected the bearer token (HTTP 401).
    #[error("unauthenticated")]
    Unauthenticated,

    /// Authenticated but not allowed to perform the action (HTTP 403).
    #[error("forbidden")]
    Forbidden,

    /// The requested resource does not exist (HTTP 404).
    #[error("not found")]
    NotFound,

    /// The server failed while handling the request (HTTP 500).
    #[error("server error")]
    Server,

    /// Any other non-success HTTP status.
    #[error("request failed with status {status}")]
    Status { status: u16, message: Option<String> },

    /// The envelope carried a `code` other than success.
    #[error("request rejected ({code}): {message}")]
    Rejected { code: i64, message: String },

    /// Transport failure, including the client-wide timeout.
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Coarse error taxonomy used for policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    Unauthorized,
    NotFound,
    Server,
    Network,
    Rejected,
    Decode,
}

impl ApiError {
    /// Map an HTTP failure status (and the server's `message`, if any).
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            401 => Self::Unauthenticated,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500 => Self::Server,
            _ => Self::Status { status, message },
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Forbidden => ErrorKind::Unauthorized,
            Self::NotFound => ErrorKind::NotFound,
            Self::Server | Self::Status { .. } => ErrorKind::Server,
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::Network(_) => ErrorKind::Network,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Text shown to the user in a transient notification.
    pub fn notice_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Session expired, please sign in again".to_string(),
            Self::Forbidden => "You do not have permission to perform this action".to_string(),
            Self::NotFound => "The requested resource does not exist".to_string(),
            Self::Server => "Server error".to_string(),
            Self::Status { status, message } => message
                .as_deref()
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request failed: {status}")),
            Self::Rejected { message, .. } if !message.is_empty() => message.clone(),
            Self::Rejected { .. } => "Request failed".to_string(),
            Self::Network(_) => "Network error, please check your connection".to_string(),
            Self::Decode(_) => "Unexpected response from server".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_well_known_statuses() {
        assert_eq!(ApiError::from_status(401, None), ApiError::Unauthenticated);
        assert_eq!(ApiError::from_status(403, None), ApiError::Forbidden);
        assert_eq!(ApiError::from_status(404, None), ApiError::NotFound);
        assert_eq!(ApiError::from_status(500, None), ApiError::Server);
        assert_eq!(
            ApiError::from_status(502, Some("bad gateway".into())),
            ApiError::Status {
                status: 502,
                message: Some("bad gateway".into())
            }
        );
    }

    #[test]
    fn notice_prefers_server_message() {
        let err = ApiError::from_status(409, Some("name already taken".into()));
        assert_eq!(err.notice_message(), "name already taken");

        let err = ApiError::from_status(409, None);
        assert_eq!(err.notice_message(), "Request failed: 409");

        assert_eq!(ApiError::rejected(400, "").notice_message(), "Request failed");
        assert_eq!(ApiError::rejected(400, "old password is incorrect").notice_message(), "old password is incorrect");
    }

    #[test]
    fn only_401_counts_as_unauthenticated() {
        assert!(ApiError::Unauthenticated.is_unauthenticated());
        assert!(!ApiError::Forbidden.is_unauthenticated());
        assert!(!ApiError::rejected(401, "bad password").is_unauthenticated());
        assert_eq!(ApiError::Forbidden.kind(), ErrorKind::Unauthorized);
        assert_eq!(ApiError::network("timed out").kind(), ErrorKind::Network);
    }
}
