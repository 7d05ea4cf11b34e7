use axum::extract::{Query, State};
use axum::Json;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::auth::{throttle, AdminAuth, AuthUser};
use crate::api::{parse_amount, AppState};
use crate::domain::{Money, ProfitShare, Transaction, UserId, Wallet};
use crate::error::AppError;
use crate::ledger::{retry_on_conflict, CreditReceipt, DepositRequest};
use crate::ratelimit::RateLimitPreset;

const DEFAULT_PAGE: i64 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub limit: Option<i64>,
}

/// Either a USD `amount`, or a `cryptoAmount` with its `currency`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositBody {
    pub user_id: String,
    pub amount: Option<String>,
    pub crypto_amount: Option<String>,
    pub currency: Option<String>,
    pub source: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResponse {
    pub new_balance: Money,
    pub duplicate: bool,
    pub event_key: String,
    pub usd_amount: Money,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub rate: Option<RustDecimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    #[serde(flatten)]
    pub wallet: Wallet,
    pub total_holdings: Money,
}

pub async fn deposit(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Json(body): Json<DepositBody>,
) -> Result<Json<DepositResponse>, AppError> {
    let user_id = body.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::BadRequest("userId is required".into()));
    }
    let user = UserId::new(user_id);

    let (usd_amount, rate, default_source) = match (
        body.amount.as_deref(),
        body.crypto_amount.as_deref(),
        body.currency.as_deref(),
    ) {
        (Some(amount), None, _) => (parse_amount("amount", amount)?, None, "manual".to_string()),
        (None, Some(crypto_amount), Some(currency)) => {
            let units = RustDecimal::from_str(crypto_amount.trim())
                .map_err(|_| AppError::BadRequest("cryptoAmount must be a decimal".into()))?;
            if units <= RustDecimal::ZERO {
                return Err(AppError::BadRequest("cryptoAmount must be positive".into()));
            }
            let quote = state.prices.usd_quote(currency, units).await?;
            if !quote.usd.is_positive() {
                return Err(AppError::BadRequest(
                    "deposit is worth less than one cent".into(),
                ));
            }
            (
                quote.usd,
                Some(quote.rate),
                format!("crypto:{}", currency.trim().to_uppercase()),
            )
        }
        _ => {
            return Err(AppError::BadRequest(
                "provide either amount, or cryptoAmount with currency".into(),
            ))
        }
    };

    throttle(&state, user.as_str(), RateLimitPreset::Deposit)?;

    let mut request = DepositRequest::new(
        user,
        usd_amount,
        body.source.unwrap_or(default_source),
    );
    if let Some(reference) = body.reference {
        request = request.with_reference(reference);
    }

    let ledger = &state.ledger;
    let receipt = retry_on_conflict(|| ledger.deposit(request.clone())).await?;
    Ok(Json(DepositResponse {
        new_balance: receipt.new_balance,
        duplicate: receipt.duplicate,
        event_key: receipt.event_key,
        usd_amount,
        rate,
    }))
}

pub async fn get_wallet(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = state.ledger.wallet(&user).await?;
    Ok(Json(WalletResponse {
        total_holdings: wallet.holdings(),
        wallet,
    }))
}

pub async fn get_transactions(
    AuthUser(user): AuthUser,
    Query(params): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let rows = state
        .ledger
        .transactions(&user, params.limit.unwrap_or(DEFAULT_PAGE))
        .await?;
    Ok(Json(rows))
}

pub async fn convert_credit(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(body): Json<crate::api::assets::AmountRequest>,
) -> Result<Json<CreditReceipt>, AppError> {
    let amount = parse_amount("amount", &body.amount)?;
    throttle(&state, user.as_str(), RateLimitPreset::CreditConversion)?;

    let ledger = &state.ledger;
    let receipt = retry_on_conflict(|| ledger.convert_to_credit(&user, amount)).await?;
    Ok(Json(receipt))
}

pub async fn get_profit_shares(
    AuthUser(user): AuthUser,
    Query(params): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProfitShare>>, AppError> {
    let shares = state
        .ledger
        .profit_shares(&user, params.limit.unwrap_or(DEFAULT_PAGE))
        .await?;
    Ok(Json(shares))
}
