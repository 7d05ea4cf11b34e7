use poolfund::pricing::cache::RateCache;
use poolfund::pricing::coingecko::CoinGeckoSource;
use poolfund::{api, config::Config, db::init_db, Ledger, PriceService, RateLimiter, Repository};
use poolfund::{Clock, SystemClock};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let ledger = Arc::new(Ledger::from_config(repo, &config));
    tracing::info!(policy = ledger.policy_name(), "ledger ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let limiter = Arc::new(RateLimiter::new(clock.clone()));
    let prices = PriceService::new(
        Arc::new(CoinGeckoSource::new(config.price_api_url.clone())),
        Arc::new(RateCache::new(
            Duration::from_secs(config.price_cache_ttl_secs),
            clock,
        )),
    );

    let app = api::create_router(api::AppState::new(ledger, config, limiter, prices));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
