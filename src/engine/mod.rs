//! Pure ledger rules, free of storage.
//!
//! - `funding`: asset status transitions driven by inflows
//! - `excess`: excess and profit-share ratio allocation at completion
//! - `waterfall`: revenue split between gap loans, contributors and margin

pub mod excess;
pub mod funding;
pub mod waterfall;

pub use excess::{allocate_excess, ExcessShare};
pub use funding::{mark_available, record_inflow, Inflow};
pub use waterfall::{
    plan, DebtFirst, DistributionPolicy, LoanClaim, ProRataSplit, ShareClaim, WaterfallPlan,
};
