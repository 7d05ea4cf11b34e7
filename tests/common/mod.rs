#![allow(dead_code)]

use poolfund::db::init_db;
use poolfund::domain::{Asset, AssetId, Money, TimeMs, UserId};
use poolfund::engine::{DebtFirst, DistributionPolicy};
use poolfund::ledger::{DepositRequest, NewAsset};
use poolfund::{Clock, Ledger, LedgerSettings, ManualClock, Repository};
use std::sync::Arc;
use tempfile::TempDir;

pub struct Harness {
    pub ledger: Ledger,
    pub repo: Arc<Repository>,
    pub clock: Arc<ManualClock>,
    _temp: TempDir,
}

pub async fn harness() -> Harness {
    harness_with_policy(Arc::new(DebtFirst)).await
}

pub async fn harness_with_policy(policy: Arc<dyn DistributionPolicy>) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("ledger.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let clock = Arc::new(ManualClock::new(TimeMs::new(1_700_000_000_000)));
    let ledger_clock: Arc<dyn Clock> = clock.clone();
    let ledger = Ledger::new(repo.clone(), LedgerSettings::default(), policy, ledger_clock);
    Harness {
        ledger,
        repo,
        clock,
        _temp: temp_dir,
    }
}

pub fn m(s: &str) -> Money {
    Money::parse(s).unwrap()
}

pub fn user(name: &str) -> UserId {
    UserId::new(name)
}

impl Harness {
    pub async fn fund(&self, who: &UserId, amount: &str) {
        let request = DepositRequest::new(who.clone(), m(amount), "manual");
        self.ledger.deposit(request).await.unwrap();
    }

    /// A $100 asset at the default 15% fee: $115 to collect.
    pub async fn asset(&self, title: &str) -> Asset {
        self.ledger
            .create_asset(NewAsset::new(title, m("100")))
            .await
            .unwrap()
    }

    pub async fn balance(&self, who: &UserId) -> Money {
        self.ledger.wallet(who).await.unwrap().balance
    }

    pub async fn withdrawable(&self, who: &UserId) -> Money {
        self.ledger.wallet(who).await.unwrap().withdrawable_balance
    }

    /// Contribute, close the gap if any, and mark the asset available.
    pub async fn available_asset(&self, backers: &[(&UserId, &str)], lender: Option<&UserId>) -> AssetId {
        let asset = self.asset("shared asset").await;
        for (who, amount) in backers {
            self.ledger.contribute(who, &asset.id, m(amount)).await.unwrap();
        }
        if let Some(lender) = lender {
            self.ledger.fund_gap(lender, &asset.id).await.unwrap();
        }
        self.ledger.mark_processed(&asset.id, None).await.unwrap();
        asset.id
    }
}
