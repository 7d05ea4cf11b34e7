//! Access ledger: who may use an asset, and post-funding purchases.

use super::funding::load_asset;
use super::{on_unique, wallet_ops, Ledger};
use crate::db::UnitOfWork;
use crate::domain::{
    generate_access_key, AccessType, Asset, AssetId, AssetPurchase, AssetStatus, DistributionId,
    Money, PaymentSource, PurchaseId, PurchaseSource, TimeMs, TransactionDetail, UserId,
    ACCESS_VALIDITY_DAYS,
};
use crate::error::LedgerError;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheck {
    pub has_access: bool,
    pub access_type: AccessType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_expiry: Option<TimeMs>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub purchase_id: PurchaseId,
    pub access_key: String,
    pub amount_paid: Money,
    pub paid_with: PaymentSource,
    pub distribution_id: DistributionId,
    pub loan_repaid: Money,
    pub profit_distributed: Money,
    pub platform_margin: Money,
}

/// Issue an access grant unless the user already holds one.
pub(super) async fn grant_access(
    uow: &mut UnitOfWork,
    user: &UserId,
    asset: &Asset,
    source: PurchaseSource,
    now: TimeMs,
) -> Result<Option<AssetPurchase>, LedgerError> {
    if uow.purchase(user, &asset.id).await?.is_some() {
        return Ok(None);
    }
    let grant = AssetPurchase {
        id: PurchaseId::generate(),
        user: user.clone(),
        asset_id: asset.id.clone(),
        purchase_amount: asset.access_price,
        access_key: generate_access_key(user, &asset.id),
        source,
        delivery_expiry: now.plus_days(ACCESS_VALIDITY_DAYS),
        created_at: now,
    };
    uow.insert_purchase(&grant)
        .await
        .map_err(|e| on_unique(e, LedgerError::AlreadyHasAccess))?;
    Ok(Some(grant))
}

impl Ledger {
    pub async fn check_access(
        &self,
        user: &UserId,
        asset_id: &AssetId,
    ) -> Result<AccessCheck, LedgerError> {
        let asset = self
            .repo
            .asset(asset_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("asset {}", asset_id)))?;

        if let Some(grant) = self.repo.purchase(user, asset_id).await? {
            return Ok(AccessCheck {
                has_access: true,
                access_type: AccessType::Purchase,
                access_key: Some(grant.access_key),
                delivery_expiry: Some(grant.delivery_expiry),
            });
        }

        let contributed = self.repo.contribution(user, asset_id).await?.is_some();
        if contributed && asset.status == AssetStatus::Available {
            return Ok(AccessCheck {
                has_access: true,
                access_type: AccessType::Contribution,
                access_key: None,
                delivery_expiry: None,
            });
        }

        Ok(AccessCheck {
            has_access: false,
            access_type: AccessType::None,
            access_key: None,
            delivery_expiry: None,
        })
    }

    /// Buy access to an available asset at its access price. The payment is
    /// revenue and goes straight through the distribution waterfall.
    pub async fn purchase(
        &self,
        user: &UserId,
        asset_id: &AssetId,
        amount: Money,
        paid_with: PaymentSource,
    ) -> Result<PurchaseReceipt, LedgerError> {
        let mut uow = self.repo.begin().await?;
        let receipt = self
            .purchase_in(&mut uow, user, asset_id, amount, paid_with)
            .await?;
        uow.commit().await?;
        Ok(receipt)
    }

    pub(crate) async fn purchase_in(
        &self,
        uow: &mut UnitOfWork,
        user: &UserId,
        asset_id: &AssetId,
        amount: Money,
        paid_with: PaymentSource,
    ) -> Result<PurchaseReceipt, LedgerError> {
        let mut asset = load_asset(uow, asset_id).await?;

        if uow.purchase(user, asset_id).await?.is_some()
            || uow.contribution(user, asset_id).await?.is_some()
        {
            return Err(LedgerError::AlreadyHasAccess);
        }
        if uow
            .loans_for_asset(asset_id)
            .await?
            .iter()
            .any(|l| &l.user == user)
        {
            return Err(LedgerError::AlreadyHasAccess);
        }
        if asset.status != AssetStatus::Available {
            return Err(LedgerError::NotAcceptingFunds(asset.status));
        }
        if !amount.approx_eq(&asset.access_price) {
            return Err(LedgerError::InvalidAmount(format!(
                "access price is {}, got {}",
                asset.access_price, amount
            )));
        }

        let charge = asset.access_price;
        let now = self.clock.now();
        let purchase_id = PurchaseId::generate();

        let mut wallet = wallet_ops::require_wallet(uow, user).await?;
        let detail = TransactionDetail::AssetPurchase {
            asset_id: asset_id.clone(),
            purchase_id: purchase_id.clone(),
            paid_with,
        };
        wallet_ops::debit(uow, &mut wallet, paid_with.field(), charge, detail, now).await?;

        let grant = AssetPurchase {
            id: purchase_id,
            user: user.clone(),
            asset_id: asset_id.clone(),
            purchase_amount: charge,
            access_key: generate_access_key(user, asset_id),
            source: PurchaseSource::Buyer,
            delivery_expiry: now.plus_days(ACCESS_VALIDITY_DAYS),
            created_at: now,
        };
        uow.insert_purchase(&grant)
            .await
            .map_err(|e| on_unique(e, LedgerError::AlreadyHasAccess))?;

        asset.total_purchases += 1;
        asset.total_revenue = asset.total_revenue + charge;
        let distribution = self.distribute_in(uow, &mut asset, charge, now).await?;

        info!(
            user = %user,
            asset = %asset_id,
            amount = %charge,
            paid_with = ?paid_with,
            "access purchased"
        );
        Ok(PurchaseReceipt {
            purchase_id: grant.id,
            access_key: grant.access_key,
            amount_paid: charge,
            paid_with,
            distribution_id: distribution.id,
            loan_repaid: distribution.loan_repaid,
            profit_distributed: distribution.contributor_profit,
            platform_margin: distribution.platform_margin,
        })
    }
}
