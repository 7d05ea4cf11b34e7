//! The funding and settlement ledger.
//!
//! Every mutating operation runs inside one [`UnitOfWork`]: all of its reads,
//! validations and writes commit together or not at all. Each public method
//! here is a thin wrapper opening a unit for a single operation; [`Ledger::apply`]
//! runs several operations in one unit.
//!
//! Submodules:
//! - `wallet_ops`: balance postings and the journal
//! - `deposits`: deposit intake
//! - `funding`: asset creation, contributions, gap loans, processing
//! - `access`: access checks and purchases
//! - `distribution`: revenue waterfall execution
//! - `withdrawals`: withdrawal desk and store credit conversion
//! - `reads`: read models
//! - `retry`: conflict retry helper

mod access;
mod deposits;
mod distribution;
mod funding;
mod reads;
mod retry;
mod wallet_ops;
mod withdrawals;

pub use access::{AccessCheck, PurchaseReceipt};
pub use deposits::{DepositReceipt, DepositRequest};
pub use funding::{ContributeReceipt, GapFundReceipt, NewAsset, ProcessReceipt};
pub use reads::AssetSummary;
pub use retry::{retry_on_conflict, retry_on_conflict_with};
pub use withdrawals::CreditReceipt;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::{is_unique_violation, Repository, UnitOfWork};
use crate::domain::{
    Asset, AssetId, Destination, Money, PaymentSource, UserId, WithdrawalId, WithdrawalOutcome,
    WithdrawalRequest,
};
use crate::engine::{DebtFirst, DistributionPolicy};
use crate::error::LedgerError;
use rust_decimal::Decimal as RustDecimal;
use std::sync::Arc;

/// Tunables that are not part of any single asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Fee applied to new assets that do not name their own.
    pub default_platform_fee: RustDecimal,
    /// Access price for new assets that do not name their own.
    pub access_price: Money,
    pub min_contribution: Money,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            default_platform_fee: RustDecimal::new(15, 2),
            access_price: Money::from_cents(100),
            min_contribution: Money::from_cents(100),
        }
    }
}

#[derive(Clone)]
pub struct Ledger {
    repo: Arc<Repository>,
    settings: LedgerSettings,
    policy: Arc<dyn DistributionPolicy>,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(
        repo: Arc<Repository>,
        settings: LedgerSettings,
        policy: Arc<dyn DistributionPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            settings,
            policy,
            clock,
        }
    }

    /// Default settings, debt-first distribution, wall clock.
    pub fn with_defaults(repo: Arc<Repository>) -> Self {
        Self::new(
            repo,
            LedgerSettings::default(),
            Arc::new(DebtFirst),
            Arc::new(SystemClock),
        )
    }

    pub fn from_config(repo: Arc<Repository>, config: &Config) -> Self {
        let settings = LedgerSettings {
            default_platform_fee: config.default_platform_fee,
            access_price: config.access_price,
            min_contribution: config.min_contribution,
        };
        Self::new(
            repo,
            settings,
            config.distribution_policy.build(),
            Arc::new(SystemClock),
        )
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Run `ops` in order inside one unit of work.
    ///
    /// Later operations see the effects of earlier ones. The first error
    /// rolls back everything and is returned as is.
    pub async fn apply(&self, ops: Vec<LedgerOp>) -> Result<Vec<LedgerOutcome>, LedgerError> {
        let mut uow = self.repo.begin().await?;
        let mut outcomes = Vec::with_capacity(ops.len());
        for op in ops {
            outcomes.push(self.apply_in(&mut uow, op).await?);
        }
        uow.commit().await?;
        Ok(outcomes)
    }

    async fn apply_in(
        &self,
        uow: &mut UnitOfWork,
        op: LedgerOp,
    ) -> Result<LedgerOutcome, LedgerError> {
        let outcome = match op {
            LedgerOp::Deposit(request) => LedgerOutcome::Deposit(self.deposit_in(uow, request).await?),
            LedgerOp::CreateAsset(new_asset) => {
                LedgerOutcome::AssetCreated(self.create_asset_in(uow, new_asset).await?)
            }
            LedgerOp::Contribute {
                user,
                asset,
                amount,
            } => LedgerOutcome::Contributed(self.contribute_in(uow, &user, &asset, amount).await?),
            LedgerOp::FundGap { user, asset } => {
                LedgerOutcome::GapFunded(self.fund_gap_in(uow, &user, &asset).await?)
            }
            LedgerOp::MarkProcessed {
                asset,
                delivery_info,
            } => LedgerOutcome::Processed(self.mark_processed_in(uow, &asset, delivery_info).await?),
            LedgerOp::Purchase {
                user,
                asset,
                amount,
                paid_with,
            } => LedgerOutcome::Purchased(
                self.purchase_in(uow, &user, &asset, amount, paid_with)
                    .await?,
            ),
            LedgerOp::RequestWithdrawal {
                user,
                amount,
                destination,
            } => LedgerOutcome::WithdrawalRequested(
                self.request_withdrawal_in(uow, &user, amount, destination)
                    .await?,
            ),
            LedgerOp::ResolveWithdrawal { id, outcome } => LedgerOutcome::WithdrawalResolved(
                self.resolve_withdrawal_in(uow, &id, outcome).await?,
            ),
            LedgerOp::CancelWithdrawal { user, id } => {
                LedgerOutcome::WithdrawalCancelled(self.cancel_withdrawal_in(uow, &user, &id).await?)
            }
            LedgerOp::ConvertToCredit { user, amount } => {
                LedgerOutcome::ConvertedToCredit(self.convert_to_credit_in(uow, &user, amount).await?)
            }
        };
        Ok(outcome)
    }
}

/// A unique-constraint failure means a concurrent unit got there first.
fn on_unique(err: sqlx::Error, duplicate: LedgerError) -> LedgerError {
    if is_unique_violation(&err) {
        duplicate
    } else {
        err.into()
    }
}

/// A single mutating ledger operation, for batching with [`Ledger::apply`].
#[derive(Debug, Clone)]
pub enum LedgerOp {
    Deposit(DepositRequest),
    CreateAsset(NewAsset),
    Contribute {
        user: UserId,
        asset: AssetId,
        amount: Money,
    },
    FundGap {
        user: UserId,
        asset: AssetId,
    },
    MarkProcessed {
        asset: AssetId,
        delivery_info: Option<serde_json::Value>,
    },
    Purchase {
        user: UserId,
        asset: AssetId,
        amount: Money,
        paid_with: PaymentSource,
    },
    RequestWithdrawal {
        user: UserId,
        amount: Money,
        destination: Destination,
    },
    ResolveWithdrawal {
        id: WithdrawalId,
        outcome: WithdrawalOutcome,
    },
    CancelWithdrawal {
        user: UserId,
        id: WithdrawalId,
    },
    ConvertToCredit {
        user: UserId,
        amount: Money,
    },
}

/// Result of one [`LedgerOp`], in the same position as its op.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOutcome {
    Deposit(DepositReceipt),
    AssetCreated(Asset),
    Contributed(ContributeReceipt),
    GapFunded(GapFundReceipt),
    Processed(ProcessReceipt),
    Purchased(PurchaseReceipt),
    WithdrawalRequested(WithdrawalRequest),
    WithdrawalResolved(WithdrawalRequest),
    WithdrawalCancelled(WithdrawalRequest),
    ConvertedToCredit(CreditReceipt),
}
