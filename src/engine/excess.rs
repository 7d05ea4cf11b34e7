//! Excess allocation at funding completion.
//!
//! Only the part of the collected total above the fee-inclusive target is
//! excess. It is split pro-rata by contribution size, each contribution's
//! share being `amount * (collected - target) / collected`. Shares are
//! truncated to cents and the leftover cents are handed out one at a time,
//! largest contribution first (ties by creation order), so the excess sum is
//! exact.

use crate::domain::{Money, Ratio};

/// Allocated excess and locked profit-share ratio for one contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcessShare {
    pub excess: Money,
    pub ratio: Ratio,
}

/// `amounts` must be in creation order; the result has the same order.
pub fn allocate_excess(amounts: &[Money], target: Money) -> Vec<ExcessShare> {
    let collected: Money = amounts.iter().copied().sum();
    let total_excess = (collected - target).max(Money::ZERO);

    if total_excess.is_zero() {
        return vec![
            ExcessShare {
                excess: Money::ZERO,
                ratio: Ratio::ZERO,
            };
            amounts.len()
        ];
    }

    let mut excess: Vec<Money> = amounts
        .iter()
        .map(|amount| Money::truncate(amount.inner() * total_excess.inner() / collected.inner()))
        .collect();

    let allocated: Money = excess.iter().copied().sum();
    let mut leftover = total_excess - allocated;
    if leftover.is_positive() {
        let mut order: Vec<usize> = (0..amounts.len()).collect();
        order.sort_by(|&a, &b| amounts[b].cmp(&amounts[a]).then(a.cmp(&b)));
        let one_cent = Money::from_cents(1);
        for &idx in order.iter().cycle() {
            if !leftover.is_positive() {
                break;
            }
            excess[idx] = excess[idx] + one_cent;
            leftover = leftover - one_cent;
        }
    }

    excess
        .into_iter()
        .map(|e| ExcessShare {
            excess: e,
            ratio: e.ratio_of(total_excess).unwrap_or(Ratio::ZERO),
        })
        .collect()
}
