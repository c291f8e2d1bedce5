// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Equal-split rule shared by expense creation and payment requests.
//!
//! A split category divides the amount by the registry size `N`. Every
//! apartment except the payer owes `amount / N` rounded to `SHARE_SCALE`
//! places; the payer's own share is implicit and never recorded. Non-split categories are borne by the payer.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::{Apartment, ApartmentId};

/// Decimal places kept on a per-apartment share. Balances built from shares
/// at this scale add up without rounding.
pub const SHARE_SCALE: u32 = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub owed_by_apartments: BTreeSet<ApartmentId>,
    pub per_apartment_share: Decimal,
}

impl Split {
    /// Share the payer carries without it being recorded as an obligation,
    /// including any remainder below the share scale.
    pub fn payer_share(&self, amount: Decimal) -> Decimal {
        amount - self.total_owed_by_others()
    }

    pub fn total_owed_by_others(&self) -> Decimal {
        self.per_apartment_share * Decimal::from(self.owed_by_apartments.len() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPolicy {
    non_split: Vec<String>,
}

impl SplitPolicy {
    pub fn new<I, S>(non_split: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            non_split: non_split
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_non_split(&self, category: &str) -> bool {
        let c = category.trim().to_lowercase();
        self.non_split.iter().any(|n| *n == c)
    }

    pub fn split(
        &self,
        amount: Decimal,
        payer: &ApartmentId,
        category: &str,
        registry: &[Apartment],
    ) -> EngineResult<Split> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::invalid(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        if registry.is_empty() {
            return Err(EngineError::invalid("cannot split against an empty apartment registry"));
        }
        if !registry.iter().any(|a| &a.id == payer) {
            return Err(EngineError::invalid(format!(
                "payer {} is not a registered apartment",
                payer
            )));
        }

        if self.is_non_split(category) {
            debug!(%payer, category, "non-split category, payer bears full cost");
            return Ok(Split {
                owed_by_apartments: BTreeSet::new(),
                per_apartment_share: Decimal::ZERO,
            });
        }

        let n = Decimal::from(registry.len() as u64);
        let per_apartment_share = (amount / n).round_dp(SHARE_SCALE);
        let owed_by_apartments: BTreeSet<ApartmentId> = registry
            .iter()
            .map(|a| a.id.clone())
            .filter(|id| id != payer)
            .collect();
        debug!(
            %payer,
            category,
            apartments = registry.len(),
            share = %per_apartment_share,
            "split computed"
        );
        Ok(Split {
            owed_by_apartments,
            per_apartment_share,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::prelude::FromPrimitive;

    fn registry() -> Vec<Apartment> {
        ["G1", "F1", "F2", "S1", "S2", "T1", "T2"]
            .iter()
            .map(|c| Apartment::new(c, format!("Apartment {}", c)))
            .collect()
    }

    fn policy() -> SplitPolicy {
        SplitPolicy::new(["cleaning"])
    }

    #[test]
    fn utilities_split_seven_ways() {
        let s = policy()
            .split(Decimal::from(700), &"G1".into(), "utilities", &registry())
            .unwrap();
        assert_eq!(s.per_apartment_share, Decimal::from(100));
        assert_eq!(s.owed_by_apartments.len(), 6);
        assert!(!s.owed_by_apartments.contains(&ApartmentId::new("G1")));
        assert_eq!(s.total_owed_by_others(), Decimal::from(600));
    }

    #[test]
    fn cleaning_is_borne_by_payer() {
        let s = policy()
            .split(Decimal::from(80), &"F1".into(), "Cleaning", &registry())
            .unwrap();
        assert!(s.owed_by_apartments.is_empty());
        assert!(s.per_apartment_share.is_zero());
        assert_eq!(s.payer_share(Decimal::from(80)), Decimal::from(80));
    }

    #[test]
    fn rejects_non_positive_amounts() {
        for amt in [Decimal::ZERO, Decimal::from(-5)] {
            let err = policy()
                .split(amt, &"G1".into(), "utilities", &registry())
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)));
        }
    }

    #[test]
    fn empty_registry_is_invalid_input() {
        let err = policy()
            .split(Decimal::from(10), &"G1".into(), "utilities", &[])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn unknown_payer_is_invalid_input() {
        let err = policy()
            .split(Decimal::from(10), &"Z9".into(), "utilities", &registry())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn sevenths_are_quantized() {
        let s = policy()
            .split(Decimal::from(100), &"G1".into(), "utilities", &registry())
            .unwrap();
        assert_eq!(s.per_apartment_share, Decimal::new(14_285714, 6));
        assert_eq!(s.payer_share(Decimal::from(100)), Decimal::new(14_285716, 6));
    }

    #[test]
    fn single_apartment_owes_nobody() {
        let solo = vec![Apartment::new("G1", "Ground")];
        let s = policy()
            .split(Decimal::from(42), &"G1".into(), "utilities", &solo)
            .unwrap();
        assert!(s.owed_by_apartments.is_empty());
        assert_eq!(s.per_apartment_share, Decimal::from(42));
        assert_eq!(s.payer_share(Decimal::from(42)), Decimal::from(42));
    }

    proptest! {
        #[test]
        fn split_reconstructs_amount(
            n in 2usize..=12,
            cents in 1u64..=10_000_000,
            payer_idx in 0usize..12,
        ) {
            let registry: Vec<Apartment> = (0..n)
                .map(|i| Apartment::new(format!("A{}", i), format!("Unit {}", i)))
                .collect();
            let payer = registry[payer_idx % n].id.clone();
            let amount = Decimal::from_u64(cents).unwrap() / Decimal::from(100);
            let s = policy().split(amount, &payer, "water", &registry).unwrap();

            prop_assert_eq!(s.owed_by_apartments.len(), n - 1);
            prop_assert!(!s.owed_by_apartments.contains(&payer));
            let rebuilt = s.total_owed_by_others() + s.payer_share(amount);
            prop_assert_eq!(rebuilt, amount);
            prop_assert!(s.per_apartment_share.scale() <= SHARE_SCALE);
        }

        #[test]
        fn exempt_category_owes_nothing(cents in 1u64..=10_000_000) {
            let amount = Decimal::from_u64(cents).unwrap() / Decimal::from(100);
            let s = policy().split(amount, &"T2".into(), "CLEANING", &registry()).unwrap();
            prop_assert!(s.owed_by_apartments.is_empty());
            prop_assert!(s.per_apartment_share.is_zero());
        }
    }
}
