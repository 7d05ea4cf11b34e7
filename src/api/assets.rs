use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal as RustDecimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::api::auth::{throttle, AdminAuth, AuthUser};
use crate::api::{parse_amount, AppState};
use crate::domain::{Asset, AssetId, PaymentSource, ProfitDistribution};
use crate::error::AppError;
use crate::ledger::{
    retry_on_conflict, AccessCheck, AssetSummary, ContributeReceipt, GapFundReceipt, NewAsset,
    ProcessReceipt, PurchaseReceipt,
};
use crate::ratelimit::RateLimitPreset;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetRequest {
    pub title: String,
    pub target_price: String,
    pub platform_fee: Option<String>,
    pub access_price: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRequest {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub amount: String,
    #[serde(default)]
    pub paid_with: PaymentSource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub delivery_info: Option<serde_json::Value>,
}

pub async fn create_asset(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Json(body): Json<CreateAssetRequest>,
) -> Result<(StatusCode, Json<Asset>), AppError> {
    let mut new_asset = NewAsset::new(body.title, parse_amount("targetPrice", &body.target_price)?);
    if let Some(fee) = body.platform_fee.as_deref() {
        let fee = RustDecimal::from_str(fee.trim())
            .map_err(|_| AppError::BadRequest("platformFee must be a decimal".into()))?;
        new_asset = new_asset.with_fee(fee);
    }
    if let Some(price) = body.access_price.as_deref() {
        new_asset = new_asset.with_access_price(parse_amount("accessPrice", price)?);
    }

    let ledger = &state.ledger;
    let asset = retry_on_conflict(|| ledger.create_asset(new_asset.clone())).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn get_asset(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AssetSummary>, AppError> {
    let summary = state.ledger.asset_summary(&AssetId::new(id)).await?;
    Ok(Json(summary))
}

pub async fn contribute(
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<AmountRequest>,
) -> Result<Json<ContributeReceipt>, AppError> {
    let amount = parse_amount("amount", &body.amount)?;
    throttle(&state, user.as_str(), RateLimitPreset::Contribution)?;

    let asset_id = AssetId::new(id);
    let ledger = &state.ledger;
    let receipt = retry_on_conflict(|| ledger.contribute(&user, &asset_id, amount)).await?;
    Ok(Json(receipt))
}

pub async fn fund_gap(
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GapFundReceipt>, AppError> {
    throttle(&state, user.as_str(), RateLimitPreset::GapFunding)?;

    let asset_id = AssetId::new(id);
    let ledger = &state.ledger;
    let receipt = retry_on_conflict(|| ledger.fund_gap(&user, &asset_id)).await?;
    Ok(Json(receipt))
}

pub async fn purchase(
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<PurchaseRequest>,
) -> Result<Json<PurchaseReceipt>, AppError> {
    let amount = parse_amount("amount", &body.amount)?;
    throttle(&state, user.as_str(), RateLimitPreset::Purchase)?;

    let asset_id = AssetId::new(id);
    let ledger = &state.ledger;
    let receipt =
        retry_on_conflict(|| ledger.purchase(&user, &asset_id, amount, body.paid_with)).await?;
    Ok(Json(receipt))
}

pub async fn check_access(
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccessCheck>, AppError> {
    let check = state.ledger.check_access(&user, &AssetId::new(id)).await?;
    Ok(Json(check))
}

pub async fn mark_processed(
    _admin: AdminAuth,
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<ProcessRequest>>,
) -> Result<Json<ProcessReceipt>, AppError> {
    let delivery_info = body.and_then(|Json(b)| b.delivery_info);
    let asset_id = AssetId::new(id);
    let ledger = &state.ledger;
    let receipt =
        retry_on_conflict(|| ledger.mark_processed(&asset_id, delivery_info.clone())).await?;
    Ok(Json(receipt))
}

pub async fn get_distributions(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProfitDistribution>>, AppError> {
    let distributions = state.ledger.distributions(&AssetId::new(id)).await?;
    Ok(Json(distributions))
}
