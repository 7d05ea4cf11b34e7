//! Read models. These go straight to the pool and never block writers.

use super::Ledger;
use crate::domain::{
    Asset, AssetId, Contribution, GapLoan, Money, ProfitDistribution, ProfitShare, Transaction,
    UserId, Wallet, WithdrawalRequest,
};
use crate::error::LedgerError;
use serde::Serialize;

pub const MAX_PAGE: i64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub asset: Asset,
    pub target_amount: Money,
    pub remaining_needed: Money,
    pub contributions: Vec<Contribution>,
    pub loans: Vec<GapLoan>,
}

fn page(limit: i64) -> i64 {
    limit.clamp(1, MAX_PAGE)
}

impl Ledger {
    pub async fn wallet(&self, user: &UserId) -> Result<Wallet, LedgerError> {
        self.repo
            .wallet_by_user(user)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("wallet for user {}", user)))
    }

    /// Journal rows for the user's wallet, newest first.
    pub async fn transactions(
        &self,
        user: &UserId,
        limit: i64,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let wallet = self.wallet(user).await?;
        Ok(self
            .repo
            .transactions_for_wallet(&wallet.id, page(limit))
            .await?)
    }

    pub async fn asset(&self, id: &AssetId) -> Result<Asset, LedgerError> {
        self.repo
            .asset(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("asset {}", id)))
    }

    pub async fn asset_summary(&self, id: &AssetId) -> Result<AssetSummary, LedgerError> {
        let (asset, contributions, loans) = futures::try_join!(
            self.repo.asset(id),
            self.repo.contributions_for_asset(id),
            self.repo.loans_for_asset(id),
        )?;
        let asset = asset.ok_or_else(|| LedgerError::not_found(format!("asset {}", id)))?;
        Ok(AssetSummary {
            target_amount: asset.target_amount(),
            remaining_needed: asset.remaining_needed(),
            asset,
            contributions,
            loans,
        })
    }

    pub async fn profit_shares(
        &self,
        user: &UserId,
        limit: i64,
    ) -> Result<Vec<ProfitShare>, LedgerError> {
        Ok(self.repo.profit_shares_for_user(user, page(limit)).await?)
    }

    pub async fn distributions(
        &self,
        asset: &AssetId,
    ) -> Result<Vec<ProfitDistribution>, LedgerError> {
        self.asset(asset).await?;
        Ok(self.repo.distributions_for_asset(asset).await?)
    }

    pub async fn withdrawals(&self, user: &UserId) -> Result<Vec<WithdrawalRequest>, LedgerError> {
        Ok(self.repo.withdrawals_for_user(user).await?)
    }
}
