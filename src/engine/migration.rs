// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use serde::Serialize;
use tracing::info;

use crate::engine::split::SplitPolicy;
use crate::error::EngineResult;
use crate::models::{Apartment, Expense, LegacyExpense, StoredExpense};

/// Brings a legacy expense to the current shape by running today's split rule.
///
/// Paid flags recorded on the legacy row are carried over untouched; if they
/// do not fit the computed obligation set the result fails its invariant
/// check downstream rather than being trimmed here.
pub fn upgrade_expense(
    legacy: LegacyExpense,
    policy: &SplitPolicy,
    registry: &[Apartment],
) -> EngineResult<Expense> {
    let split = policy.split(
        legacy.amount,
        &legacy.paid_by_apartment,
        &legacy.category,
        registry,
    )?;
    info!(expense = legacy.id, "backfilling split fields on legacy expense");
    Ok(Expense {
        id: legacy.id,
        description: legacy.description,
        amount: legacy.amount,
        date: legacy.date,
        category: legacy.category,
        paid_by_apartment: legacy.paid_by_apartment,
        owed_by_apartments: split.owed_by_apartments,
        per_apartment_share: split.per_apartment_share,
        paid_by_apartments: legacy.paid_by_apartments,
        receipt: legacy.receipt,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpgradeOutcome {
    pub current: Vec<Expense>,
    /// Ids of rows that were legacy and now need their split fields written back.
    pub upgraded: Vec<i64>,
}

/// Normalizes a fetched snapshot so every downstream consumer sees only current expenses.
pub fn upgrade_all(
    stored: Vec<StoredExpense>,
    policy: &SplitPolicy,
    registry: &[Apartment],
) -> EngineResult<UpgradeOutcome> {
    let mut out = UpgradeOutcome::default();
    for row in stored {
        match row {
            StoredExpense::Current(e) => out.current.push(e),
            StoredExpense::Legacy(l) => {
                let e = upgrade_expense(l, policy, registry)?;
                out.upgraded.push(e.id);
                out.current.push(e);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApartmentId;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    fn registry() -> Vec<Apartment> {
        ["G1", "F1", "F2"]
            .iter()
            .map(|c| Apartment::new(c, format!("Apartment {}", c)))
            .collect()
    }

    fn legacy(id: i64, category: &str) -> LegacyExpense {
        LegacyExpense {
            id,
            description: "old bill".into(),
            amount: Decimal::from(90),
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            category: category.into(),
            paid_by_apartment: "G1".into(),
            paid_by_apartments: BTreeSet::new(),
            receipt: None,
        }
    }

    #[test]
    fn legacy_gets_split_fields() {
        let e = upgrade_expense(legacy(3, "water"), &SplitPolicy::new(["cleaning"]), &registry())
            .unwrap();
        assert_eq!(e.per_apartment_share, Decimal::from(30));
        assert_eq!(
            e.owed_by_apartments,
            [ApartmentId::new("F1"), ApartmentId::new("F2")]
                .into_iter()
                .collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn upgrade_all_is_idempotent() {
        let policy = SplitPolicy::new(["cleaning"]);
        let first = upgrade_all(
            vec![
                StoredExpense::Legacy(legacy(1, "water")),
                StoredExpense::Legacy(legacy(2, "cleaning")),
            ],
            &policy,
            &registry(),
        )
        .unwrap();
        assert_eq!(first.upgraded, vec![1, 2]);
        assert!(first.current[1].owed_by_apartments.is_empty());

        let again = upgrade_all(
            first.current.iter().cloned().map(StoredExpense::Current).collect(),
            &policy,
            &registry(),
        )
        .unwrap();
        assert!(again.upgraded.is_empty());
        assert_eq!(again.current, first.current);
    }
}
