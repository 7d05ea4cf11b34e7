//! Records of revenue events and the per-contributor credits they produced.

use crate::domain::{AssetId, ContributionId, DistributionId, Money, Ratio, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// One revenue event split through the waterfall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitDistribution {
    pub id: DistributionId,
    pub asset_id: AssetId,
    pub revenue: Money,
    pub loan_repaid: Money,
    pub contributor_profit: Money,
    pub platform_margin: Money,
    pub shares_paid: i64,
    pub policy: String,
    pub created_at: TimeMs,
}

impl ProfitDistribution {
    /// Every cent of revenue is accounted for exactly once.
    pub fn is_conserved(&self) -> bool {
        self.loan_repaid + self.contributor_profit + self.platform_margin == self.revenue
    }
}

/// Credit to one contributor's withdrawable balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitShare {
    pub distribution_id: DistributionId,
    pub contribution_id: ContributionId,
    pub asset_id: AssetId,
    pub user: UserId,
    pub amount: Money,
    pub ratio: Ratio,
    pub created_at: TimeMs,
}
