//! Profit distribution waterfall.
//!
//! Revenue from a post-funding sale is split between outstanding gap loans
//! and contributors holding a profit-share ratio. How much the loans take is
//! decided by a [`DistributionPolicy`]; everything after that is fixed:
//! contributor credits are truncated to cents and whatever is left is
//! platform margin.

use crate::domain::{ContributionId, LoanId, Money, Ratio};
use rust_decimal::Decimal as RustDecimal;
use std::fmt;

/// Decides the loan side of a revenue split.
pub trait DistributionPolicy: Send + Sync + fmt::Debug {
    /// Stable name recorded with every distribution.
    fn name(&self) -> &'static str;

    /// Portion of `revenue` routed to loan repayment given the total
    /// `outstanding` across active loans. Must not exceed either.
    fn loan_allotment(&self, revenue: Money, outstanding: Money) -> Money;
}

/// Loans are senior: they absorb all revenue until fully repaid.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebtFirst;

impl DistributionPolicy for DebtFirst {
    fn name(&self) -> &'static str {
        "debt_first"
    }

    fn loan_allotment(&self, revenue: Money, outstanding: Money) -> Money {
        revenue.min(outstanding)
    }
}

/// Loans take a fixed fraction of each sale while outstanding; contributors
/// share the rest from the first sale.
#[derive(Debug, Clone, Copy)]
pub struct ProRataSplit {
    pub loan_share: RustDecimal,
}

impl DistributionPolicy for ProRataSplit {
    fn name(&self) -> &'static str {
        "pro_rata"
    }

    fn loan_allotment(&self, revenue: Money, outstanding: Money) -> Money {
        revenue.multiply(self.loan_share).min(outstanding).min(revenue)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanClaim {
    pub loan_id: LoanId,
    pub remaining: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareClaim {
    pub contribution_id: ContributionId,
    pub ratio: Ratio,
}

/// Fully resolved split of one revenue event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaterfallPlan {
    pub revenue: Money,
    pub repayments: Vec<(LoanId, Money)>,
    pub credits: Vec<(ContributionId, Money)>,
    pub loan_repaid: Money,
    pub contributor_profit: Money,
    pub platform_margin: Money,
}

/// Split `revenue`. Loans are repaid oldest first, in the order given.
pub fn plan(
    policy: &dyn DistributionPolicy,
    revenue: Money,
    loans: &[LoanClaim],
    shares: &[ShareClaim],
) -> WaterfallPlan {
    let outstanding: Money = loans.iter().map(|l| l.remaining).sum();
    let mut loan_pot = policy
        .loan_allotment(revenue, outstanding)
        .min(outstanding)
        .max(Money::ZERO);

    let mut repayments = Vec::new();
    for loan in loans {
        if !loan_pot.is_positive() {
            break;
        }
        let applied = loan_pot.min(loan.remaining);
        if applied.is_positive() {
            repayments.push((loan.loan_id.clone(), applied));
            loan_pot = loan_pot - applied;
        }
    }
    let loan_repaid: Money = repayments.iter().map(|(_, amount)| *amount).sum();

    let equity = revenue - loan_repaid;
    let credits: Vec<(ContributionId, Money)> = shares
        .iter()
        .filter(|s| !s.ratio.is_zero())
        .map(|s| (s.contribution_id.clone(), equity.floor_share(s.ratio)))
        .filter(|(_, amount)| amount.is_positive())
        .collect();
    let contributor_profit: Money = credits.iter().map(|(_, amount)| *amount).sum();

    WaterfallPlan {
        revenue,
        repayments,
        credits,
        loan_repaid,
        contributor_profit,
        platform_margin: equity - contributor_profit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    fn loan(id: &str, remaining: &str) -> LoanClaim {
        LoanClaim {
            loan_id: LoanId::new(id),
            remaining: m(remaining),
        }
    }

    fn share(id: &str, ratio: &str) -> ShareClaim {
        ShareClaim {
            contribution_id: ContributionId::new(id),
            ratio: Ratio::parse(ratio).unwrap(),
        }
    }

    #[test]
    fn test_debt_first_takes_everything_while_owed() {
        let p = plan(&DebtFirst, m("1"), &[loan("l1", "20")], &[share("c1", "1")]);
        assert_eq!(p.repayments, vec![(LoanId::new("l1"), m("1"))]);
        assert!(p.credits.is_empty());
        assert!(p.contributor_profit.is_zero());
        assert!(p.platform_margin.is_zero());
    }

    #[test]
    fn test_debt_first_spills_over_after_final_repayment() {
        let p = plan(
            &DebtFirst,
            m("1"),
            &[loan("l1", "0.40")],
            &[share("c1", "0.5"), share("c2", "0.5")],
        );
        assert_eq!(p.loan_repaid, m("0.40"));
        assert_eq!(
            p.credits,
            vec![
                (ContributionId::new("c1"), m("0.30")),
                (ContributionId::new("c2"), m("0.30")),
            ]
        );
        assert!(p.platform_margin.is_zero());
    }

    #[test]
    fn test_rounding_remainder_is_margin() {
        let third = "0.33333333";
        let p = plan(
            &DebtFirst,
            m("1"),
            &[],
            &[share("a", third), share("b", third), share("c", "0.33333334")],
        );
        assert_eq!(p.contributor_profit, m("0.99"));
        assert_eq!(p.platform_margin, m("0.01"));
        assert_eq!(p.loan_repaid + p.contributor_profit + p.platform_margin, p.revenue);
    }

    #[test]
    fn test_no_claims_is_all_margin() {
        let p = plan(&DebtFirst, m("1"), &[], &[share("c1", "0")]);
        assert!(p.credits.is_empty());
        assert_eq!(p.platform_margin, m("1"));
    }

    #[test]
    fn test_pro_rata_split_shares_revenue() {
        let policy = ProRataSplit {
            loan_share: RustDecimal::from_str("0.5").unwrap(),
        };
        let p = plan(&policy, m("1"), &[loan("l1", "20")], &[share("c1", "1")]);
        assert_eq!(p.loan_repaid, m("0.50"));
        assert_eq!(p.contributor_profit, m("0.50"));
        assert_eq!(policy.name(), "pro_rata");
    }

    #[test]
    fn test_pro_rata_caps_at_outstanding() {
        let policy = ProRataSplit {
            loan_share: RustDecimal::from_str("0.5").unwrap(),
        };
        let p = plan(&policy, m("1"), &[loan("l1", "0.10")], &[share("c1", "1")]);
        assert_eq!(p.loan_repaid, m("0.10"));
        assert_eq!(p.contributor_profit, m("0.90"));
    }

    #[test]
    fn test_loans_repaid_in_order() {
        let p = plan(&DebtFirst, m("5"), &[loan("old", "3"), loan("new", "10")], &[]);
        assert_eq!(
            p.repayments,
            vec![(LoanId::new("old"), m("3")), (LoanId::new("new"), m("2"))]
        );
    }
}
