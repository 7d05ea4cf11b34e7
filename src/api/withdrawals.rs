use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::auth::{throttle, AdminAuth, AuthUser};
use crate::api::{parse_amount, AppState};
use crate::domain::{Destination, WithdrawalId, WithdrawalOutcome, WithdrawalRequest};
use crate::error::AppError;
use crate::ledger::retry_on_conflict;
use crate::ratelimit::RateLimitPreset;

pub const SUPPORTED_CURRENCIES: [&str; 7] = ["BTC", "ETH", "USDT", "USDC", "XMR", "LTC", "BCH"];
const MIN_ADDRESS_LEN: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalBody {
    pub amount: String,
    pub currency: String,
    pub address: String,
}

fn destination(body: &WithdrawalBody) -> Result<Destination, AppError> {
    let currency = body.currency.trim().to_uppercase();
    if !SUPPORTED_CURRENCIES.contains(&currency.as_str()) {
        return Err(AppError::BadRequest(format!(
            "unsupported currency {}, expected one of {}",
            currency,
            SUPPORTED_CURRENCIES.join(", ")
        )));
    }
    let address = body.address.trim();
    if address.len() < MIN_ADDRESS_LEN {
        return Err(AppError::BadRequest("invalid withdrawal address".into()));
    }
    Ok(Destination {
        currency,
        address: address.to_string(),
    })
}

pub async fn list_withdrawals(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<WithdrawalRequest>>, AppError> {
    Ok(Json(state.ledger.withdrawals(&user).await?))
}

pub async fn request_withdrawal(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(body): Json<WithdrawalBody>,
) -> Result<(StatusCode, Json<WithdrawalRequest>), AppError> {
    let amount = parse_amount("amount", &body.amount)?;
    let destination = destination(&body)?;
    throttle(&state, user.as_str(), RateLimitPreset::Withdrawal)?;

    let ledger = &state.ledger;
    let request =
        retry_on_conflict(|| ledger.request_withdrawal(&user, amount, destination.clone())).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn cancel_withdrawal(
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WithdrawalRequest>, AppError> {
    let id = WithdrawalId::new(id);
    let ledger = &state.ledger;
    let request = retry_on_conflict(|| ledger.cancel_withdrawal(&user, &id)).await?;
    Ok(Json(request))
}

pub async fn resolve_withdrawal(
    _admin: AdminAuth,
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(outcome): Json<WithdrawalOutcome>,
) -> Result<Json<WithdrawalRequest>, AppError> {
    let id = WithdrawalId::new(id);
    let ledger = &state.ledger;
    let request = retry_on_conflict(|| ledger.resolve_withdrawal(&id, outcome.clone())).await?;
    Ok(Json(request))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(currency: &str, address: &str) -> WithdrawalBody {
        WithdrawalBody {
            amount: "5".to_string(),
            currency: currency.to_string(),
            address: address.to_string(),
        }
    }

    #[test]
    fn test_destination_normalizes_currency() {
        let dest = destination(&body(" eth ", "0xabcdef0123456789")).unwrap();
        assert_eq!(dest.currency, "ETH");
        assert_eq!(dest.address, "0xabcdef0123456789");
    }

    #[test]
    fn test_destination_rejects_unknown_currency_and_short_address() {
        assert!(matches!(
            destination(&body("DOGE", "0xabcdef0123456789")),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            destination(&body("BTC", "bc1short")),
            Err(AppError::BadRequest(_))
        ));
    }
}
