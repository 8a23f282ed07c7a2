//! Error handling for the faucet server.

use crate::address::AddressError;
use crate::broadcast::BroadcastError;
use crate::ledger::RateLimitError;
use crate::signer::SigningError;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Faucet server error types
#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("Invalid claim: {0}")]
    Validation(String),

    #[error("Unsupported denomination: {0}")]
    UnknownDenom(String),

    #[error("captcha failed, please refresh page and try again")]
    VerificationFailed,

    #[error("please wait a while for another tap ({retry_after_secs}s remaining)")]
    Throttled { retry_after_secs: u64 },

    #[error("amount limit exceeded for {denom}")]
    QuotaExceeded { denom: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Remote account query failed: {0}")]
    RemoteQuery(String),

    #[error("Failed to build transfer transaction: {0}")]
    BuildTx(String),

    #[error("status: {status}, message: {body}")]
    Broadcast { status: u16, body: String },

    #[error("Remote ledger unreachable: {0}")]
    Transient(String),

    #[error("Malformed remote response: {0}")]
    Parse(String),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<AddressError> for FaucetError {
    fn from(err: AddressError) -> Self {
        FaucetError::Validation(err.to_string())
    }
}

impl From<RateLimitError> for FaucetError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Throttled { retry_after_secs } => {
                FaucetError::Throttled { retry_after_secs }
            }
            RateLimitError::QuotaExceeded { denom } => FaucetError::QuotaExceeded { denom },
            RateLimitError::UnknownDenom(denom) => FaucetError::UnknownDenom(denom),
            RateLimitError::Storage(msg) => FaucetError::Storage(msg),
        }
    }
}

impl From<BroadcastError> for FaucetError {
    fn from(err: BroadcastError) -> Self {
        match err {
            BroadcastError::Rejected { status, body } => FaucetError::Broadcast { status, body },
            BroadcastError::Transient(msg) => FaucetError::Transient(msg),
        }
    }
}

impl FaucetError {
    /// HTTP status the boundary reports for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            FaucetError::Validation(_)
            | FaucetError::UnknownDenom(_)
            | FaucetError::VerificationFailed => StatusCode::BAD_REQUEST,
            FaucetError::Throttled { .. } | FaucetError::QuotaExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            FaucetError::RemoteQuery(_)
            | FaucetError::BuildTx(_)
            | FaucetError::Broadcast { .. }
            | FaucetError::Parse(_) => StatusCode::BAD_GATEWAY,
            FaucetError::Transient(_) => StatusCode::GATEWAY_TIMEOUT,
            FaucetError::Storage(_)
            | FaucetError::Signing(_)
            | FaucetError::ConfigError(_)
            | FaucetError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let error_message = match self {
            FaucetError::Storage(_) | FaucetError::Signing(_) | FaucetError::Internal(_) => {
                "Internal server error".to_string()
            }
            FaucetError::ConfigError(_) => "Configuration error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Result type alias for faucet operations
pub type FaucetResult<T> = Result<T, FaucetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_errors_map_to_too_many_requests() {
        let throttled: FaucetError = RateLimitError::Throttled { retry_after_secs: 12 }.into();
        assert_eq!(throttled.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert!(throttled.to_string().contains("12s"));

        let quota: FaucetError = RateLimitError::QuotaExceeded {
            denom: "uluna".to_string(),
        }
        .into();
        assert_eq!(quota.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_broadcast_errors_keep_status_and_body() {
        let err: FaucetError = BroadcastError::Rejected {
            status: 500,
            body: "out of gas".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "status: 500, message: out of gas");

        let err: FaucetError = BroadcastError::Transient("timed out".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_storage_error_is_internal() {
        let err: FaucetError = RateLimitError::Storage("disk full".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
