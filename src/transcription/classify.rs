//! Transport error classification.
//!
//! The dispatcher decides whether to retry a chunk based solely on the
//! category produced here, so classification is a pure function of the
//! transport failure.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A transport-level failure from the speech service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// Classified failure category for one chunk attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Network,
    RateLimit,
    ServerError,
    Auth,
    InvalidAudio,
    Decode,
    Cancelled,
    Unknown,
}

impl ErrorKind {
    /// Whether waiting and repeating the same request bytes can help.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::Network | ErrorKind::RateLimit | ErrorKind::ServerError
        )
    }

    /// Whether this failure invalidates every remaining chunk.
    pub fn aborts_plan(&self) -> bool {
        matches!(self, ErrorKind::Auth)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::RateLimit => "rate limit",
            ErrorKind::ServerError => "server error",
            ErrorKind::Auth => "authentication",
            ErrorKind::InvalidAudio => "invalid audio",
            ErrorKind::Decode => "decode",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Maps a transport failure to its category.
pub fn classify(error: &ServiceError) -> ErrorKind {
    match error {
        ServiceError::Timeout => ErrorKind::Timeout,
        ServiceError::Network(_) => ErrorKind::Network,
        ServiceError::Status { status: 429, .. } => ErrorKind::RateLimit,
        ServiceError::Status {
            status: 500 | 502 | 503 | 504,
            ..
        } => ErrorKind::ServerError,
        ServiceError::Status {
            status: 401 | 403, ..
        } => ErrorKind::Auth,
        ServiceError::Status {
            status: 400,
            message,
        } if mentions_audio(message) => ErrorKind::InvalidAudio,
        ServiceError::Status { .. } => ErrorKind::Unknown,
        ServiceError::InvalidResponse(_) => ErrorKind::Unknown,
    }
}

fn mentions_audio(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("audio") || lowered.contains("file") || lowered.contains("format")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, message: &str) -> ServiceError {
        ServiceError::Status {
            status: code,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_classification_table() {
        let cases: Vec<(ServiceError, ErrorKind, bool)> = vec![
            (ServiceError::Timeout, ErrorKind::Timeout, true),
            (
                ServiceError::Network("dns failure".into()),
                ErrorKind::Network,
                true,
            ),
            (status(429, "slow down"), ErrorKind::RateLimit, true),
            (status(500, "oops"), ErrorKind::ServerError, true),
            (status(502, "bad gateway"), ErrorKind::ServerError, true),
            (status(503, "unavailable"), ErrorKind::ServerError, true),
            (status(504, "gateway timeout"), ErrorKind::ServerError, true),
            (status(401, "bad key"), ErrorKind::Auth, false),
            (status(403, "forbidden"), ErrorKind::Auth, false),
            (
                status(400, "Unsupported audio format"),
                ErrorKind::InvalidAudio,
                false,
            ),
            (
                status(400, "The file is corrupted"),
                ErrorKind::InvalidAudio,
                false,
            ),
            (status(400, "missing model parameter"), ErrorKind::Unknown, false),
            (status(404, "not found"), ErrorKind::Unknown, false),
            (status(422, "unprocessable"), ErrorKind::Unknown, false),
            (
                ServiceError::InvalidResponse("not json".into()),
                ErrorKind::Unknown,
                false,
            ),
        ];

        for (error, expected_kind, expected_retryable) in cases {
            let kind = classify(&error);
            assert_eq!(kind, expected_kind, "for {:?}", error);
            assert_eq!(kind.retryable(), expected_retryable, "for {:?}", error);
        }
    }

    #[test]
    fn test_classification_is_deterministic() {
        let error = status(400, "bad AUDIO data");
        assert_eq!(classify(&error), classify(&error));
        assert_eq!(classify(&error), ErrorKind::InvalidAudio);
    }

    #[test]
    fn test_only_auth_aborts_plan() {
        assert!(ErrorKind::Auth.aborts_plan());
        for kind in [
            ErrorKind::Timeout,
            ErrorKind::Network,
            ErrorKind::RateLimit,
            ErrorKind::ServerError,
            ErrorKind::InvalidAudio,
            ErrorKind::Decode,
            ErrorKind::Cancelled,
            ErrorKind::Unknown,
        ] {
            assert!(!kind.aborts_plan());
        }
    }
}
