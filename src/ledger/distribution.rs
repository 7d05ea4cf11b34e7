//! Executes a revenue waterfall against storage.

use super::{wallet_ops, Ledger};
use crate::db::UnitOfWork;
use crate::domain::{
    Asset, BalanceField, ContributionStatus, DistributionId, LoanStatus, Money, ProfitDistribution,
    ProfitShare, TimeMs, TransactionDetail,
};
use crate::engine::{plan, LoanClaim, ShareClaim};
use crate::error::LedgerError;
use tracing::{debug, info};

impl Ledger {
    /// Split `revenue` from a sale of `asset` and post every resulting
    /// credit. The caller saves nothing afterwards: the asset's running
    /// totals are written here.
    pub(crate) async fn distribute_in(
        &self,
        uow: &mut UnitOfWork,
        asset: &mut Asset,
        revenue: Money,
        now: TimeMs,
    ) -> Result<ProfitDistribution, LedgerError> {
        let mut loans: Vec<_> = uow
            .loans_for_asset(&asset.id)
            .await?
            .into_iter()
            .filter(|l| l.status == LoanStatus::Active)
            .collect();
        let mut contributions = uow.contributions_for_asset(&asset.id).await?;

        let loan_claims: Vec<LoanClaim> = loans
            .iter()
            .map(|l| LoanClaim {
                loan_id: l.id.clone(),
                remaining: l.remaining_amount,
            })
            .collect();
        let share_claims: Vec<ShareClaim> = contributions
            .iter()
            .map(|c| ShareClaim {
                contribution_id: c.id.clone(),
                ratio: c.profit_share_ratio,
            })
            .collect();
        let split = plan(self.policy.as_ref(), revenue, &loan_claims, &share_claims);

        let distribution = ProfitDistribution {
            id: DistributionId::generate(),
            asset_id: asset.id.clone(),
            revenue,
            loan_repaid: split.loan_repaid,
            contributor_profit: split.contributor_profit,
            platform_margin: split.platform_margin,
            shares_paid: split.credits.len() as i64,
            policy: self.policy.name().to_string(),
            created_at: now,
        };
        uow.insert_distribution(&distribution).await?;

        for (loan_id, amount) in &split.repayments {
            let Some(loan) = loans.iter_mut().find(|l| &l.id == loan_id) else {
                continue;
            };
            let applied = loan.repay(*amount);
            if !applied.is_positive() {
                continue;
            }
            uow.save_loan(loan).await?;

            let mut lender = wallet_ops::require_wallet(uow, &loan.user).await?;
            let detail = TransactionDetail::GapLoanRepayment {
                asset_id: asset.id.clone(),
                loan_id: loan.id.clone(),
                remaining_after: loan.remaining_amount,
            };
            wallet_ops::credit(uow, &mut lender, BalanceField::Spendable, applied, detail, now)
                .await?;
            if loan.status == LoanStatus::FullyRepaid {
                info!(asset = %asset.id, loan = %loan.id, "gap loan fully repaid");
            }
        }

        for (contribution_id, amount) in &split.credits {
            let Some(contribution) = contributions.iter_mut().find(|c| &c.id == contribution_id)
            else {
                continue;
            };
            contribution.total_profit_received = contribution.total_profit_received + *amount;
            if contribution.status == ContributionStatus::Active
                && contribution.excess_amount.is_positive()
                && contribution.total_profit_received >= contribution.excess_amount
            {
                contribution.status = ContributionStatus::ConvertedToInvestment;
                info!(contribution = %contribution.id, "excess recouped");
            }
            uow.save_contribution(contribution).await?;

            let mut holder = wallet_ops::require_wallet(uow, &contribution.user).await?;
            holder.total_profit_received = holder.total_profit_received + *amount;
            let detail = TransactionDetail::ProfitDistribution {
                asset_id: asset.id.clone(),
                contribution_id: contribution.id.clone(),
                share_ratio: contribution.profit_share_ratio,
                revenue,
            };
            wallet_ops::credit(uow, &mut holder, BalanceField::Withdrawable, *amount, detail, now)
                .await?;

            uow.insert_profit_share(&ProfitShare {
                distribution_id: distribution.id.clone(),
                contribution_id: contribution.id.clone(),
                asset_id: asset.id.clone(),
                user: contribution.user.clone(),
                amount: *amount,
                ratio: contribution.profit_share_ratio,
                created_at: now,
            })
            .await?;
        }

        asset.total_profit_distributed = asset.total_profit_distributed + split.contributor_profit;
        asset.platform_margin = asset.platform_margin + split.platform_margin;
        uow.save_asset(asset).await?;

        debug!(
            asset = %asset.id,
            revenue = %revenue,
            loan_repaid = %split.loan_repaid,
            contributor_profit = %split.contributor_profit,
            margin = %split.platform_margin,
            policy = self.policy.name(),
            "revenue distributed"
        );
        Ok(distribution)
    }
}
