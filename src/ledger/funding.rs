//! Asset funding: creation, contributions, gap loans and processing.

use super::{access, on_unique, wallet_ops, Ledger};
use crate::db::UnitOfWork;
use crate::domain::{
    Asset, AssetId, AssetStatus, BalanceField, Contribution, ContributionId, ContributionStatus,
    GapLoan, LoanId, LoanStatus, Money, PurchaseSource, Ratio, TransactionDetail, UserId,
};
use crate::engine::{allocate_excess, mark_available, record_inflow};
use crate::error::LedgerError;
use rust_decimal::Decimal as RustDecimal;
use serde::Serialize;
use tracing::{debug, info};

/// Parameters for opening a new asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    pub title: String,
    pub target_price: Money,
    /// Falls back to the ledger's default fee.
    pub platform_fee: Option<RustDecimal>,
    /// Falls back to the ledger's default access price.
    pub access_price: Option<Money>,
}

impl NewAsset {
    pub fn new(title: impl Into<String>, target_price: Money) -> Self {
        Self {
            title: title.into(),
            target_price,
            platform_fee: None,
            access_price: None,
        }
    }

    pub fn with_fee(mut self, fee: RustDecimal) -> Self {
        self.platform_fee = Some(fee);
        self
    }

    pub fn with_access_price(mut self, price: Money) -> Self {
        self.access_price = Some(price);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributeReceipt {
    pub contribution_id: ContributionId,
    pub amount: Money,
    /// Zero until the asset completes funding.
    pub excess_amount: Money,
    pub is_fully_funded: bool,
    pub remaining_needed: Money,
    pub asset_status: AssetStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapFundReceipt {
    pub loan_id: LoanId,
    pub gap_amount: Money,
    pub new_asset_status: AssetStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReceipt {
    pub contributors_granted: usize,
    pub lenders_granted: usize,
}

pub(super) async fn load_asset(uow: &mut UnitOfWork, id: &AssetId) -> Result<Asset, LedgerError> {
    uow.asset(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("asset {}", id)))
}

/// Lock in every contribution's excess and profit-share ratio. Runs once,
/// in the unit that moves the asset to PURCHASED.
async fn settle_excess(uow: &mut UnitOfWork, asset: &Asset) -> Result<Vec<Contribution>, LedgerError> {
    let mut contributions = uow.contributions_for_asset(&asset.id).await?;
    let amounts: Vec<Money> = contributions.iter().map(|c| c.amount).collect();
    let shares = allocate_excess(&amounts, asset.target_amount());

    for (contribution, share) in contributions.iter_mut().zip(shares) {
        contribution.excess_amount = share.excess;
        contribution.profit_share_ratio = share.ratio;
        uow.save_contribution(contribution).await?;
    }

    let total_excess: Money = contributions.iter().map(|c| c.excess_amount).sum();
    info!(
        asset = %asset.id,
        contributions = contributions.len(),
        total_excess = %total_excess,
        "excess locked in"
    );
    Ok(contributions)
}

impl Ledger {
    /// Open an asset directly in COLLECTING.
    pub async fn create_asset(&self, new_asset: NewAsset) -> Result<Asset, LedgerError> {
        let mut uow = self.repo.begin().await?;
        let asset = self.create_asset_in(&mut uow, new_asset).await?;
        uow.commit().await?;
        Ok(asset)
    }

    pub(crate) async fn create_asset_in(
        &self,
        uow: &mut UnitOfWork,
        new_asset: NewAsset,
    ) -> Result<Asset, LedgerError> {
        let title = new_asset.title.trim();
        if title.is_empty() {
            return Err(LedgerError::InvalidOperation(
                "asset title must not be empty".to_string(),
            ));
        }
        wallet_ops::ensure_amount(new_asset.target_price)?;
        let platform_fee = new_asset
            .platform_fee
            .unwrap_or(self.settings.default_platform_fee);
        if platform_fee.is_sign_negative() || platform_fee > RustDecimal::ONE {
            return Err(LedgerError::InvalidAmount(format!(
                "platform fee must be between 0 and 1, got {}",
                platform_fee
            )));
        }
        let access_price = new_asset.access_price.unwrap_or(self.settings.access_price);
        wallet_ops::ensure_amount(access_price)?;

        let asset = Asset {
            id: AssetId::generate(),
            title: title.to_string(),
            target_price: new_asset.target_price,
            platform_fee,
            access_price,
            current_collected: Money::ZERO,
            status: AssetStatus::Collecting,
            total_purchases: 0,
            total_revenue: Money::ZERO,
            total_profit_distributed: Money::ZERO,
            platform_margin: Money::ZERO,
            delivery_info: None,
            created_at: self.clock.now(),
            purchased_at: None,
            available_at: None,
        };
        uow.insert_asset(&asset).await?;
        info!(asset = %asset.id, target = %asset.target_amount(), "asset opened");
        Ok(asset)
    }

    /// Pledge `amount` from the user's spendable balance toward an asset.
    pub async fn contribute(
        &self,
        user: &UserId,
        asset_id: &AssetId,
        amount: Money,
    ) -> Result<ContributeReceipt, LedgerError> {
        let mut uow = self.repo.begin().await?;
        let receipt = self.contribute_in(&mut uow, user, asset_id, amount).await?;
        uow.commit().await?;
        Ok(receipt)
    }

    pub(crate) async fn contribute_in(
        &self,
        uow: &mut UnitOfWork,
        user: &UserId,
        asset_id: &AssetId,
        amount: Money,
    ) -> Result<ContributeReceipt, LedgerError> {
        wallet_ops::ensure_amount(amount)?;
        if amount < self.settings.min_contribution {
            return Err(LedgerError::InvalidAmount(format!(
                "minimum contribution is {}, got {}",
                self.settings.min_contribution, amount
            )));
        }

        let mut asset = load_asset(uow, asset_id).await?;
        if uow.contribution(user, asset_id).await?.is_some() {
            return Err(LedgerError::AlreadyContributed);
        }
        if asset.status != AssetStatus::Collecting {
            return Err(LedgerError::NotAcceptingFunds(asset.status));
        }

        let now = self.clock.now();
        let contribution = Contribution {
            id: ContributionId::generate(),
            user: user.clone(),
            asset_id: asset_id.clone(),
            amount,
            excess_amount: Money::ZERO,
            profit_share_ratio: Ratio::ZERO,
            total_profit_received: Money::ZERO,
            status: ContributionStatus::Active,
            created_at: now,
        };

        let mut wallet = wallet_ops::require_wallet(uow, user).await?;
        wallet.total_contributed = wallet.total_contributed + amount;
        let detail = TransactionDetail::Pledge {
            asset_id: asset_id.clone(),
            contribution_id: contribution.id.clone(),
        };
        wallet_ops::debit(uow, &mut wallet, BalanceField::Spendable, amount, detail, now).await?;
        uow.insert_contribution(&contribution)
            .await
            .map_err(|e| on_unique(e, LedgerError::AlreadyContributed))?;

        let inflow = record_inflow(&mut asset, amount, now)?;
        uow.save_asset(&asset).await?;

        let mut excess_amount = Money::ZERO;
        if inflow.completed_funding {
            let settled = settle_excess(uow, &asset).await?;
            if let Some(mine) = settled.iter().find(|c| c.id == contribution.id) {
                excess_amount = mine.excess_amount;
            }
        }

        debug!(
            user = %user,
            asset = %asset_id,
            amount = %amount,
            collected = %inflow.collected,
            "contribution recorded"
        );
        Ok(ContributeReceipt {
            contribution_id: contribution.id,
            amount,
            excess_amount,
            is_fully_funded: inflow.completed_funding,
            remaining_needed: inflow.remaining_needed,
            asset_status: asset.status,
        })
    }

    /// Lend exactly the remaining shortfall, completing the asset's funding.
    pub async fn fund_gap(
        &self,
        user: &UserId,
        asset_id: &AssetId,
    ) -> Result<GapFundReceipt, LedgerError> {
        let mut uow = self.repo.begin().await?;
        let receipt = self.fund_gap_in(&mut uow, user, asset_id).await?;
        uow.commit().await?;
        Ok(receipt)
    }

    pub(crate) async fn fund_gap_in(
        &self,
        uow: &mut UnitOfWork,
        user: &UserId,
        asset_id: &AssetId,
    ) -> Result<GapFundReceipt, LedgerError> {
        let mut asset = load_asset(uow, asset_id).await?;
        match asset.status {
            AssetStatus::Collecting => {}
            AssetStatus::Purchased | AssetStatus::Available => return Err(LedgerError::AlreadyFunded),
            other => return Err(LedgerError::NotAcceptingFunds(other)),
        }

        let gap = asset.target_amount() - asset.current_collected;
        if !gap.is_positive() {
            return Err(LedgerError::AlreadyFunded);
        }

        let loans = uow.loans_for_asset(asset_id).await?;
        if loans
            .iter()
            .any(|l| &l.user == user && l.status == LoanStatus::Active)
        {
            return Err(LedgerError::DuplicateLoan);
        }

        let now = self.clock.now();
        let loan = GapLoan {
            id: LoanId::generate(),
            user: user.clone(),
            asset_id: asset_id.clone(),
            loan_amount: gap,
            repaid_amount: Money::ZERO,
            remaining_amount: gap,
            status: LoanStatus::Active,
            created_at: now,
        };

        let mut wallet = wallet_ops::require_wallet(uow, user).await?;
        let detail = TransactionDetail::GapLoanDisbursement {
            asset_id: asset_id.clone(),
            loan_id: loan.id.clone(),
        };
        wallet_ops::debit(uow, &mut wallet, BalanceField::Spendable, gap, detail, now).await?;
        uow.insert_loan(&loan)
            .await
            .map_err(|e| on_unique(e, LedgerError::DuplicateLoan))?;

        let inflow = record_inflow(&mut asset, gap, now)?;
        uow.save_asset(&asset).await?;
        if inflow.completed_funding {
            settle_excess(uow, &asset).await?;
        }

        info!(user = %user, asset = %asset_id, loan = %loan.id, gap = %gap, "gap loan funded");
        Ok(GapFundReceipt {
            loan_id: loan.id,
            gap_amount: gap,
            new_asset_status: asset.status,
        })
    }

    /// PURCHASED -> AVAILABLE, granting access to every backer lacking it.
    pub async fn mark_processed(
        &self,
        asset_id: &AssetId,
        delivery_info: Option<serde_json::Value>,
    ) -> Result<ProcessReceipt, LedgerError> {
        let mut uow = self.repo.begin().await?;
        let receipt = self.mark_processed_in(&mut uow, asset_id, delivery_info).await?;
        uow.commit().await?;
        Ok(receipt)
    }

    pub(crate) async fn mark_processed_in(
        &self,
        uow: &mut UnitOfWork,
        asset_id: &AssetId,
        delivery_info: Option<serde_json::Value>,
    ) -> Result<ProcessReceipt, LedgerError> {
        let mut asset = load_asset(uow, asset_id).await?;
        let now = self.clock.now();
        mark_available(&mut asset, delivery_info, now)?;
        uow.save_asset(&asset).await?;

        let mut receipt = ProcessReceipt {
            contributors_granted: 0,
            lenders_granted: 0,
        };
        for contribution in uow.contributions_for_asset(asset_id).await? {
            let granted = access::grant_access(
                uow,
                &contribution.user,
                &asset,
                PurchaseSource::Contributor,
                now,
            )
            .await?;
            if granted.is_some() {
                receipt.contributors_granted += 1;
            }
        }
        for loan in uow.loans_for_asset(asset_id).await? {
            let granted =
                access::grant_access(uow, &loan.user, &asset, PurchaseSource::GapLender, now)
                    .await?;
            if granted.is_some() {
                receipt.lenders_granted += 1;
            }
        }

        info!(
            asset = %asset_id,
            contributors = receipt.contributors_granted,
            lenders = receipt.lenders_granted,
            "access granted to backers"
        );
        Ok(receipt)
    }
}
