use crate::domain::{AssetStatus, BalanceField, Money, MoneyError};
use crate::pricing::PriceError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure kinds raised by ledger operations.
///
/// Any of these aborts the surrounding unit of work; nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient funds in {field}: available {available}, requested {requested}")]
    InsufficientFunds {
        field: BalanceField,
        available: Money,
        requested: Money,
    },
    #[error("asset is not accepting funds (status {0})")]
    NotAcceptingFunds(AssetStatus),
    #[error("asset is already fully funded")]
    AlreadyFunded,
    #[error("user has already contributed to this asset")]
    AlreadyContributed,
    #[error("user already has an active gap loan on this asset")]
    DuplicateLoan,
    #[error("user already has access to this asset")]
    AlreadyHasAccess,
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("concurrent update conflict, retry the request")]
    ConcurrencyConflict,
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Only lock contention is worth retrying automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict)
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        LedgerError::NotFound(what.into())
    }
}

/// SQLite result codes for BUSY, LOCKED and their extended forms
/// (BUSY_RECOVERY, LOCKED_SHAREDCACHE, BUSY_SNAPSHOT).
const CONFLICT_CODES: [&str; 5] = ["5", "6", "261", "262", "517"];

fn is_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let by_code = db
                .code()
                .map(|code| CONFLICT_CODES.contains(&code.as_ref()))
                .unwrap_or(false);
            by_code || db.message().contains("database is locked")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if is_conflict(&err) {
            LedgerError::ConcurrencyConflict
        } else {
            LedgerError::Storage(err.to_string())
        }
    }
}

impl From<MoneyError> for LedgerError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::InvalidAmount(msg) => LedgerError::InvalidAmount(msg),
            MoneyError::InvalidOperation(msg) => LedgerError::InvalidOperation(msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Price lookup failed: {0}")]
    Price(#[from] PriceError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<MoneyError> for AppError {
    fn from(err: MoneyError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InsufficientFunds { .. }
        | LedgerError::InvalidAmount(_)
        | LedgerError::InvalidOperation(_)
        | LedgerError::NotAcceptingFunds(_)
        | LedgerError::AlreadyFunded => StatusCode::BAD_REQUEST,
        LedgerError::AlreadyContributed
        | LedgerError::DuplicateLoan
        | LedgerError::AlreadyHasAccess
        | LedgerError::InvalidState(_)
        | LedgerError::ConcurrencyConflict => StatusCode::CONFLICT,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Ledger(LedgerError::Storage(msg)) => {
                tracing::error!("storage failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Ledger(err) => (ledger_status(err), err.to_string()),
            AppError::Price(
                PriceError::UnsupportedCurrency(_) | PriceError::OutOfRange { .. },
            ) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Price(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        match self {
            AppError::RateLimited { retry_after_secs } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(LedgerError::ConcurrencyConflict.is_retryable());
        assert!(!LedgerError::AlreadyFunded.is_retryable());
        assert!(!LedgerError::Storage("disk".into()).is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_a_conflict() {
        let err: LedgerError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err, LedgerError::ConcurrencyConflict);
        let err: LedgerError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, LedgerError::Storage(_)));
    }

    #[test]
    fn test_money_errors_keep_their_kind() {
        let err: LedgerError = MoneyError::InvalidOperation("division by zero".into()).into();
        assert!(matches!(err, LedgerError::InvalidOperation(_)));
    }

    #[test]
    fn test_status_mapping() {
        let resp = AppError::from(LedgerError::AlreadyHasAccess).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let resp = AppError::from(LedgerError::not_found("asset")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = AppError::from(LedgerError::AlreadyFunded).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = AppError::RateLimited { retry_after_secs: 7 }.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "7");
    }
}
