//! Error types for the payment flows.

use open_payments_types::GrantKind;
use thiserror::Error;

/// A failed call to an Open Payments server
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("failed to sign request to {url}: {message}")]
    Signing { url: String, message: String },
}

impl ApiError {
    /// Upstream HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Request-level failures. Any of these aborts the whole request.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),

    #[error("Expected {expected} grant for {scope}, but the authorization server returned a {actual} grant")]
    UnexpectedGrantState {
        scope: String,
        expected: GrantKind,
        actual: GrantKind,
    },

    #[error("Pending grant for {scope} has no interaction redirect")]
    MissingInteraction { scope: String },

    #[error("Expected finalized grant. The grant might not be accepted or might be already used.")]
    GrantNotFinalized,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl PaymentError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True when the upstream rejected our credentials (grant denied or expired)
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, PaymentError::Api(e) if e.is_unauthorized())
    }
}

/// Failures inside the recurring transfer loop. Recorded, never propagated.
#[derive(Debug, Error)]
pub enum IterationError {
    #[error("transfer {iteration} failed: {source}")]
    TransferCreation {
        iteration: u32,
        #[source]
        source: ApiError,
    },

    #[error("token rotation before transfer {iteration} failed: {reason}")]
    RotationExhausted { iteration: u32, reason: String },
}

impl IterationError {
    pub fn iteration(&self) -> u32 {
        match self {
            IterationError::TransferCreation { iteration, .. } => *iteration,
            IterationError::RotationExhausted { iteration, .. } => *iteration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16) -> ApiError {
        ApiError::Status {
            url: "https://auth.example/continue/1".to_string(),
            status,
            body: "{}".to_string(),
        }
    }

    #[test]
    fn test_unauthorized_detection() {
        assert!(PaymentError::from(status_error(401)).is_unauthorized());
        assert!(!PaymentError::from(status_error(403)).is_unauthorized());
        assert!(!PaymentError::GrantNotFinalized.is_unauthorized());
        assert!(
            !PaymentError::from(ApiError::Transport {
                url: "https://x".to_string(),
                message: "connection reset".to_string(),
            })
            .is_unauthorized()
        );
    }

    #[test]
    fn test_unexpected_grant_state_message() {
        let err = PaymentError::UnexpectedGrantState {
            scope: "quote".to_string(),
            expected: GrantKind::Finalized,
            actual: GrantKind::Pending,
        };
        assert_eq!(
            err.to_string(),
            "Expected finalized grant for quote, but the authorization server returned a pending grant"
        );
    }

    #[test]
    fn test_iteration_error_reports_iteration() {
        let err = IterationError::TransferCreation {
            iteration: 3,
            source: status_error(500),
        };
        assert_eq!(err.iteration(), 3);
        assert!(err.to_string().starts_with("transfer 3 failed"));
    }
}
