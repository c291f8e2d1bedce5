// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Net position of every apartment, folded from the full expense history.
//!
//! Nothing is carried between calls. Each call starts from zero for every
//! registered apartment and walks all expenses, so the result depends only on
//! the set of expenses and never on their order.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::{Apartment, ApartmentId, Expense};

/// Balances at or below this magnitude count as settled.
pub const SETTLED_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApartmentBalance {
    pub apartment: ApartmentId,
    /// Positive: others owe this apartment. Negative: it owes others.
    pub balance: Decimal,
    pub owes: BTreeMap<ApartmentId, Decimal>,
    pub is_owed: BTreeMap<ApartmentId, Decimal>,
}

impl ApartmentBalance {
    fn empty(apartment: ApartmentId) -> Self {
        Self {
            apartment,
            balance: Decimal::ZERO,
            owes: BTreeMap::new(),
            is_owed: BTreeMap::new(),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.balance.abs() <= SETTLED_TOLERANCE
    }

    pub fn total_owes(&self) -> Decimal {
        self.owes.values().copied().sum()
    }

    pub fn total_is_owed(&self) -> Decimal {
        self.is_owed.values().copied().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceReport {
    pub balances: BTreeMap<ApartmentId, ApartmentBalance>,
}

impl BalanceReport {
    pub fn get(&self, id: &ApartmentId) -> Option<&ApartmentBalance> {
        self.balances.get(id)
    }

    pub fn balance_of(&self, id: &ApartmentId) -> Decimal {
        self.balances
            .get(id)
            .map(|b| b.balance)
            .unwrap_or(Decimal::ZERO)
    }

    /// Sum of every balance. Zero for any valid history.
    pub fn net_total(&self) -> Decimal {
        self.balances.values().map(|b| b.balance).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApartmentBalance> {
        self.balances.values()
    }
}

pub fn compute_balances(expenses: &[Expense], apartments: &[Apartment]) -> EngineResult<BalanceReport> {
    let mut balances: BTreeMap<ApartmentId, ApartmentBalance> = apartments
        .iter()
        .map(|a| (a.id.clone(), ApartmentBalance::empty(a.id.clone())))
        .collect();

    for expense in expenses {
        if let Err(err) = check_expense(expense, &balances) {
            warn!(expense = expense.id, error = %err, "refusing to aggregate inconsistent expense");
            return Err(err);
        }

        let share = expense.per_apartment_share;
        let unpaid: Vec<&ApartmentId> = expense.unpaid().collect();
        if unpaid.is_empty() {
            continue;
        }

        for debtor in &unpaid {
            if let Some(entry) = balances.get_mut(*debtor) {
                entry.balance -= share;
                *entry
                    .owes
                    .entry(expense.paid_by_apartment.clone())
                    .or_insert(Decimal::ZERO) += share;
            }
        }

        if let Some(payer) = balances.get_mut(&expense.paid_by_apartment) {
            // one credit per debit so the two sides round identically
            for debtor in unpaid {
                payer.balance += share;
                *payer
                    .is_owed
                    .entry(debtor.clone())
                    .or_insert(Decimal::ZERO) += share;
            }
        }
    }

    debug!(
        expenses = expenses.len(),
        apartments = balances.len(),
        "balances recomputed"
    );
    Ok(BalanceReport { balances })
}

fn check_expense(
    expense: &Expense,
    known: &BTreeMap<ApartmentId, ApartmentBalance>,
) -> EngineResult<()> {
    expense.check_invariants()?;
    let referenced = std::iter::once(&expense.paid_by_apartment).chain(expense.owed_by_apartments.iter());
    for id in referenced {
        if !known.contains_key(id) {
            return Err(EngineError::inconsistent(format!(
                "expense {} references unregistered apartment {}",
                expense.id, id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::split::SplitPolicy;
    use crate::engine::tracker::mark_paid;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn registry() -> Vec<Apartment> {
        ["G1", "F1", "F2", "S1", "S2", "T1", "T2"]
            .iter()
            .map(|c| Apartment::new(c, format!("Apartment {}", c)))
            .collect()
    }

    fn expense(id: i64, amount: i64, payer: &str, category: &str) -> Expense {
        let payer = ApartmentId::new(payer);
        let split = SplitPolicy::new(["cleaning"])
            .split(Decimal::from(amount), &payer, category, &registry())
            .unwrap();
        Expense {
            id,
            description: format!("expense {}", id),
            amount: Decimal::from(amount),
            date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            category: category.into(),
            paid_by_apartment: payer,
            owed_by_apartments: split.owed_by_apartments,
            per_apartment_share: split.per_apartment_share,
            paid_by_apartments: BTreeSet::new(),
            receipt: None,
        }
    }

    #[test]
    fn utilities_before_any_payment() {
        let report = compute_balances(&[expense(1, 700, "G1", "utilities")], &registry()).unwrap();
        assert_eq!(report.balance_of(&"G1".into()), Decimal::from(600));
        for other in ["F1", "F2", "S1", "S2", "T1", "T2"] {
            let b = report.get(&other.into()).unwrap();
            assert_eq!(b.balance, Decimal::from(-100));
            assert_eq!(b.owes.get(&ApartmentId::new("G1")), Some(&Decimal::from(100)));
        }
        assert_eq!(report.get(&"G1".into()).unwrap().is_owed.len(), 6);
        assert!(report.net_total().is_zero());
    }

    #[test]
    fn partial_payments_reduce_payer_credit() {
        let mut e = expense(1, 700, "G1", "utilities");
        mark_paid(&e, &"F1".into()).unwrap().apply(&mut e);
        mark_paid(&e, &"S1".into()).unwrap().apply(&mut e);

        let report = compute_balances(&[e], &registry()).unwrap();
        assert_eq!(report.balance_of(&"G1".into()), Decimal::from(400));
        assert!(report.balance_of(&"F1".into()).is_zero());
        assert!(report.balance_of(&"S1".into()).is_zero());
        for other in ["F2", "S2", "T1", "T2"] {
            assert_eq!(report.balance_of(&other.into()), Decimal::from(-100));
        }
        let f1 = report.get(&"F1".into()).unwrap();
        assert!(f1.owes.is_empty());
        assert!(f1.is_settled());
    }

    #[test]
    fn cleaning_contributes_nothing() {
        let report = compute_balances(&[expense(1, 80, "F1", "cleaning")], &registry()).unwrap();
        assert!(report.iter().all(|b| b.balance.is_zero() && b.owes.is_empty()));
    }

    #[test]
    fn owes_accumulate_across_expenses() {
        let expenses = vec![
            expense(1, 700, "G1", "utilities"),
            expense(2, 140, "G1", "internet"),
            expense(3, 70, "F1", "water"),
        ];
        let report = compute_balances(&expenses, &registry()).unwrap();
        let f1 = report.get(&"F1".into()).unwrap();
        assert_eq!(f1.owes.get(&ApartmentId::new("G1")), Some(&Decimal::from(120)));
        assert_eq!(f1.is_owed.get(&ApartmentId::new("G1")), Some(&Decimal::from(10)));
        assert_eq!(f1.balance, Decimal::from(-120 + 60));
        assert!(report.net_total().is_zero());
    }

    #[test]
    fn uneven_seventh_nets_to_exactly_zero() {
        let mut e = expense(1, 1, "G1", "utilities");
        let amount = Decimal::new(99_999_999, 2);
        let split = SplitPolicy::new(["cleaning"])
            .split(amount, &"G1".into(), "utilities", &registry())
            .unwrap();
        e.amount = amount;
        e.per_apartment_share = split.per_apartment_share;

        let report = compute_balances(&[e], &registry()).unwrap();
        assert!(report.net_total().is_zero());
        assert_eq!(
            report.balance_of(&"G1".into()),
            split.per_apartment_share * Decimal::from(6)
        );
    }

    #[test]
    fn stray_paid_entry_is_inconsistent() {
        let mut e = expense(9, 700, "G1", "utilities");
        e.paid_by_apartments.insert("G1".into());
        let err = compute_balances(&[e], &registry()).unwrap_err();
        assert!(matches!(err, EngineError::InconsistentState(_)));
    }

    #[test]
    fn unregistered_apartment_is_inconsistent() {
        let mut e = expense(9, 700, "G1", "utilities");
        e.owed_by_apartments.insert("X9".into());
        let err = compute_balances(&[e], &registry()).unwrap_err();
        assert!(matches!(err, EngineError::InconsistentState(_)));
    }

    #[test]
    fn empty_history_is_all_zero() {
        let report = compute_balances(&[], &registry()).unwrap();
        assert_eq!(report.balances.len(), 7);
        assert!(report.iter().all(ApartmentBalance::is_settled));
    }
}
