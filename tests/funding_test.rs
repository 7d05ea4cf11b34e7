mod common;

use common::{harness, m, user};
use poolfund::domain::{AssetId, AssetStatus, BalanceField, ContributionStatus, LoanStatus};
use poolfund::ledger::NewAsset;
use poolfund::LedgerError;
use rust_decimal::Decimal as RustDecimal;

#[tokio::test]
async fn test_exact_funding_completes_without_excess() {
    let h = harness().await;
    let alice = user("alice");
    h.fund(&alice, "200").await;
    let asset = h.asset("exact").await;
    assert_eq!(asset.target_amount(), m("115"));

    let receipt = h.ledger.contribute(&alice, &asset.id, m("115")).await.unwrap();
    assert!(receipt.is_fully_funded);
    assert_eq!(receipt.asset_status, AssetStatus::Purchased);
    assert!(receipt.excess_amount.is_zero());
    assert!(receipt.remaining_needed.is_zero());

    let wallet = h.ledger.wallet(&alice).await.unwrap();
    assert_eq!(wallet.balance, m("85"));
    assert_eq!(wallet.total_contributed, m("115"));

    let summary = h.ledger.asset_summary(&asset.id).await.unwrap();
    assert_eq!(summary.asset.current_collected, m("115"));
    assert!(summary.asset.purchased_at.is_some());
    assert!(summary.contributions[0].profit_share_ratio.is_zero());
}

#[tokio::test]
async fn test_overfunding_splits_excess_by_size() {
    let h = harness().await;
    let (alice, bob) = (user("alice"), user("bob"));
    h.fund(&alice, "100").await;
    h.fund(&bob, "100").await;
    let asset = h.asset("popular").await;

    let first = h.ledger.contribute(&alice, &asset.id, m("100")).await.unwrap();
    assert!(!first.is_fully_funded);
    assert_eq!(first.remaining_needed, m("15"));
    assert_eq!(first.asset_status, AssetStatus::Collecting);

    let second = h.ledger.contribute(&bob, &asset.id, m("100")).await.unwrap();
    assert!(second.is_fully_funded);
    assert_eq!(second.excess_amount, m("42.50"));

    let summary = h.ledger.asset_summary(&asset.id).await.unwrap();
    assert_eq!(summary.asset.current_collected, m("200"));
    assert_eq!(summary.contributions.len(), 2);
    for contribution in &summary.contributions {
        assert_eq!(contribution.excess_amount, m("42.50"));
        assert_eq!(contribution.profit_share_ratio.to_canonical_string(), "0.50000000");
        assert_eq!(contribution.status, ContributionStatus::Active);
    }
}

#[tokio::test]
async fn test_gap_loan_closes_the_shortfall() {
    let h = harness().await;
    let (alice, bob) = (user("alice"), user("bob"));
    h.fund(&alice, "80").await;
    h.fund(&bob, "50").await;
    let asset = h.asset("gapped").await;

    h.ledger.contribute(&alice, &asset.id, m("80")).await.unwrap();
    let receipt = h.ledger.fund_gap(&bob, &asset.id).await.unwrap();
    assert_eq!(receipt.gap_amount, m("35"));
    assert_eq!(receipt.new_asset_status, AssetStatus::Purchased);
    assert_eq!(h.balance(&bob).await, m("15"));

    let summary = h.ledger.asset_summary(&asset.id).await.unwrap();
    assert_eq!(summary.loans.len(), 1);
    assert_eq!(summary.loans[0].remaining_amount, m("35"));
    assert_eq!(summary.loans[0].status, LoanStatus::Active);
    assert!(summary.contributions[0].excess_amount.is_zero());
}

#[tokio::test]
async fn test_gap_funding_rejections() {
    let h = harness().await;
    let (alice, bob) = (user("alice"), user("bob"));
    h.fund(&alice, "200").await;
    h.fund(&bob, "10").await;
    let asset = h.asset("gapped").await;
    h.ledger.contribute(&alice, &asset.id, m("80")).await.unwrap();

    // bob cannot cover the $35 gap
    let err = h.ledger.fund_gap(&bob, &asset.id).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds {
            field: BalanceField::Spendable,
            ..
        }
    ));

    h.ledger.fund_gap(&alice, &asset.id).await.unwrap();
    let err = h.ledger.fund_gap(&alice, &asset.id).await.unwrap_err();
    assert_eq!(err, LedgerError::AlreadyFunded);
}

#[tokio::test]
async fn test_contribution_rejections() {
    let h = harness().await;
    let (alice, bob, nobody) = (user("alice"), user("bob"), user("nobody"));
    h.fund(&alice, "200").await;
    h.fund(&bob, "20").await;
    let asset = h.asset("guarded").await;

    let err = h.ledger.contribute(&alice, &asset.id, m("0.50")).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));

    let err = h
        .ledger
        .contribute(&alice, &AssetId::new("missing"), m("10"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let err = h.ledger.contribute(&nobody, &asset.id, m("10")).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let err = h.ledger.contribute(&bob, &asset.id, m("50")).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(h.balance(&bob).await, m("20"));

    h.ledger.contribute(&alice, &asset.id, m("10")).await.unwrap();
    let err = h.ledger.contribute(&alice, &asset.id, m("10")).await.unwrap_err();
    assert_eq!(err, LedgerError::AlreadyContributed);

    h.fund(&bob, "200").await;
    h.ledger.fund_gap(&bob, &asset.id).await.unwrap();
    let carol = user("carol");
    h.fund(&carol, "50").await;
    let err = h.ledger.contribute(&carol, &asset.id, m("10")).await.unwrap_err();
    assert_eq!(err, LedgerError::NotAcceptingFunds(AssetStatus::Purchased));
}

#[tokio::test]
async fn test_create_asset_validates_input() {
    let h = harness().await;
    let err = h
        .ledger
        .create_asset(NewAsset::new("  ", m("100")))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidOperation(_) | LedgerError::InvalidAmount(_)));

    let err = h
        .ledger
        .create_asset(NewAsset::new("negative fee", m("100")).with_fee(RustDecimal::new(-1, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_) | LedgerError::InvalidOperation(_)));

    let asset = h
        .ledger
        .create_asset(
            NewAsset::new("no fee", m("40"))
                .with_fee(RustDecimal::ZERO)
                .with_access_price(m("2.50")),
        )
        .await
        .unwrap();
    assert_eq!(asset.target_amount(), m("40"));
    assert_eq!(asset.access_price, m("2.50"));
    assert_eq!(asset.status, AssetStatus::Collecting);
}

#[tokio::test]
async fn test_mark_processed_grants_every_backer() {
    let h = harness().await;
    let (alice, bob) = (user("alice"), user("bob"));
    h.fund(&alice, "100").await;
    h.fund(&bob, "100").await;
    let asset = h.asset("delivered").await;
    h.ledger.contribute(&alice, &asset.id, m("95")).await.unwrap();

    let err = h.ledger.mark_processed(&asset.id, None).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    h.ledger.fund_gap(&bob, &asset.id).await.unwrap();
    let info = serde_json::json!({"url": "https://cdn.example/asset"});
    let receipt = h
        .ledger
        .mark_processed(&asset.id, Some(info.clone()))
        .await
        .unwrap();
    assert_eq!(receipt.contributors_granted, 1);
    assert_eq!(receipt.lenders_granted, 1);

    let stored = h.ledger.asset(&asset.id).await.unwrap();
    assert_eq!(stored.status, AssetStatus::Available);
    assert_eq!(stored.delivery_info, Some(info));

    for who in [&alice, &bob] {
        let check = h.ledger.check_access(who, &asset.id).await.unwrap();
        assert!(check.has_access);
        assert_eq!(check.access_key.as_ref().map(|k| k.len()), Some(64));
    }

    let err = h.ledger.mark_processed(&asset.id, None).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}
