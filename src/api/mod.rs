pub mod assets;
pub mod auth;
pub mod health;
pub mod wallet;
pub mod withdrawals;

use crate::config::Config;
use crate::domain::Money;
use crate::error::AppError;
use crate::ledger::Ledger;
use crate::pricing::PriceService;
use crate::ratelimit::RateLimiter;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub config: Config,
    pub limiter: Arc<RateLimiter>,
    pub prices: PriceService,
}

impl AppState {
    pub fn new(
        ledger: Arc<Ledger>,
        config: Config,
        limiter: Arc<RateLimiter>,
        prices: PriceService,
    ) -> Self {
        Self {
            ledger,
            config,
            limiter,
            prices,
        }
    }
}

/// Parse a request amount: positive, at most two decimals.
pub(crate) fn parse_amount(field: &str, raw: &str) -> Result<Money, AppError> {
    Money::parse_amount(raw).map_err(|e| AppError::BadRequest(format!("{}: {}", field, e)))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/assets", post(assets::create_asset))
        .route("/v1/assets/:id", get(assets::get_asset))
        .route("/v1/assets/:id/contribute", post(assets::contribute))
        .route("/v1/assets/:id/gap-fund", post(assets::fund_gap))
        .route("/v1/assets/:id/purchase", post(assets::purchase))
        .route("/v1/assets/:id/access", get(assets::check_access))
        .route("/v1/assets/:id/process", post(assets::mark_processed))
        .route("/v1/assets/:id/distributions", get(assets::get_distributions))
        .route("/v1/wallet", get(wallet::get_wallet))
        .route("/v1/wallet/deposit", post(wallet::deposit))
        .route("/v1/wallet/transactions", get(wallet::get_transactions))
        .route("/v1/wallet/convert-credit", post(wallet::convert_credit))
        .route("/v1/wallet/profit-shares", get(wallet::get_profit_shares))
        .route(
            "/v1/withdrawals",
            get(withdrawals::list_withdrawals).post(withdrawals::request_withdrawal),
        )
        .route("/v1/withdrawals/:id", delete(withdrawals::cancel_withdrawal))
        .route(
            "/v1/admin/withdrawals/:id",
            patch(withdrawals::resolve_withdrawal),
        )
        .layer(cors)
        .with_state(state)
}
