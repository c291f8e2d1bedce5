// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::{ApartmentId, Expense};

/// Partial update of an expense: only `paid_by_apartments` is ever written back,
/// and storage applies it as a single-member change for `apartment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaidUpdate {
    pub expense_id: i64,
    pub apartment: ApartmentId,
    pub paid: bool,
    pub paid_by_apartments: BTreeSet<ApartmentId>,
    pub changed: bool,
}

impl PaidUpdate {
    pub fn apply(&self, expense: &mut Expense) {
        expense.paid_by_apartments = self.paid_by_apartments.clone();
    }
}

/// Who is asking to toggle a payment flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Apartment(ApartmentId),
    Admin,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Apartment(id) => write!(f, "{}", id),
            Actor::Admin => f.write_str("admin"),
        }
    }
}

/// The payer may toggle anyone on its expense, others only themselves, admin anything.
pub fn authorize_toggle(actor: &Actor, expense: &Expense, target: &ApartmentId) -> EngineResult<()> {
    match actor {
        Actor::Admin => Ok(()),
        Actor::Apartment(id) if *id == expense.paid_by_apartment => Ok(()),
        Actor::Apartment(id) if id == target => Ok(()),
        Actor::Apartment(id) => Err(EngineError::Unauthorized(format!(
            "{} may only change its own payment state on expense {}",
            id, expense.id
        ))),
    }
}

pub fn mark_paid(expense: &Expense, apartment: &ApartmentId) -> EngineResult<PaidUpdate> {
    if !expense.owed_by_apartments.contains(apartment) {
        return Err(EngineError::invalid(format!(
            "{} does not owe anything on expense {}",
            apartment, expense.id
        )));
    }
    let mut paid = expense.paid_by_apartments.clone();
    let changed = paid.insert(apartment.clone());
    if !changed {
        debug!(expense = expense.id, %apartment, "already marked paid");
    }
    Ok(PaidUpdate {
        expense_id: expense.id,
        apartment: apartment.clone(),
        paid: true,
        paid_by_apartments: paid,
        changed,
    })
}

pub fn mark_unpaid(expense: &Expense, apartment: &ApartmentId) -> PaidUpdate {
    let mut paid = expense.paid_by_apartments.clone();
    let changed = paid.remove(apartment);
    if !changed {
        debug!(expense = expense.id, %apartment, "already unpaid");
    }
    PaidUpdate {
        expense_id: expense.id,
        apartment: apartment.clone(),
        paid: false,
        paid_by_apartments: paid,
        changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn expense() -> Expense {
        Expense {
            id: 1,
            description: "Electricity".into(),
            amount: Decimal::from(700),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            category: "utilities".into(),
            paid_by_apartment: "G1".into(),
            owed_by_apartments: ["F1", "F2", "S1", "S2", "T1", "T2"]
                .iter()
                .map(|c| ApartmentId::new(c))
                .collect(),
            per_apartment_share: Decimal::from(100),
            paid_by_apartments: BTreeSet::new(),
            receipt: None,
        }
    }

    #[test]
    fn mark_paid_twice_is_noop() {
        let mut e = expense();
        let f1 = ApartmentId::new("F1");
        let first = mark_paid(&e, &f1).unwrap();
        assert!(first.changed);
        first.apply(&mut e);
        let second = mark_paid(&e, &f1).unwrap();
        assert!(!second.changed);
        assert_eq!(second.paid_by_apartments, first.paid_by_apartments);
    }

    #[test]
    fn mark_unpaid_removes_only_target() {
        let mut e = expense();
        mark_paid(&e, &"F1".into()).unwrap().apply(&mut e);
        mark_paid(&e, &"S1".into()).unwrap().apply(&mut e);
        let upd = mark_unpaid(&e, &"F1".into());
        assert!(upd.changed);
        assert_eq!(
            upd.paid_by_apartments.into_iter().collect::<Vec<_>>(),
            vec![ApartmentId::new("S1")]
        );
    }

    #[test]
    fn mark_unpaid_when_absent_is_noop() {
        let e = expense();
        let upd = mark_unpaid(&e, &"T2".into());
        assert!(!upd.changed);
        assert!(upd.paid_by_apartments.is_empty());
    }

    #[test]
    fn payer_cannot_be_marked_paid() {
        let e = expense();
        assert!(matches!(
            mark_paid(&e, &"G1".into()),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn capability_rules() {
        let e = expense();
        let f1 = ApartmentId::new("F1");
        let f2 = ApartmentId::new("F2");
        assert!(authorize_toggle(&Actor::Apartment("G1".into()), &e, &f2).is_ok());
        assert!(authorize_toggle(&Actor::Apartment(f1.clone()), &e, &f1).is_ok());
        assert!(matches!(
            authorize_toggle(&Actor::Apartment(f1), &e, &f2),
            Err(EngineError::Unauthorized(_))
        ));
        assert!(authorize_toggle(&Actor::Admin, &e, &f2).is_ok());
    }
}
