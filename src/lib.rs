pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod pricing;
pub mod ratelimit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::{init_db, Repository, UnitOfWork};
pub use domain::{AssetId, AssetStatus, Money, Ratio, TimeMs, UserId};
pub use error::{AppError, LedgerError};
pub use ledger::{Ledger, LedgerOp, LedgerOutcome, LedgerSettings};
pub use pricing::{PriceError, PriceService, PriceSource};
pub use ratelimit::{RateLimitPreset, RateLimiter};
