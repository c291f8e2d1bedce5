// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Direct settlements and the monthly balance sheet derived from them.

use rust_decimal::Decimal;
use tracing::info;

use crate::engine::tracker::Actor;
use crate::error::{EngineError, EngineResult};
use crate::models::{Apartment, ApartmentId, BalanceSheet, Expense, Payment, PaymentStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub payer: ApartmentId,
    pub payee: ApartmentId,
    pub amount: Decimal,
    pub month: String,
    pub receipt: Option<String>,
}

impl NewPayment {
    pub fn validate(&self, registry: &[Apartment]) -> EngineResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(EngineError::invalid(format!(
                "payment amount must be positive, got {}",
                self.amount
            )));
        }
        if self.payer == self.payee {
            return Err(EngineError::invalid("an apartment cannot pay itself"));
        }
        for id in [&self.payer, &self.payee] {
            if !registry.iter().any(|a| &a.id == id) {
                return Err(EngineError::invalid(format!("unknown apartment {}", id)));
            }
        }
        Ok(())
    }
}

fn decide(payment: &mut Payment, actor: &Actor, to: PaymentStatus) -> EngineResult<()> {
    if payment.status != PaymentStatus::Pending {
        return Err(EngineError::invalid(format!(
            "payment {} is already {}",
            payment.id, payment.status
        )));
    }
    match actor {
        Actor::Admin => {}
        Actor::Apartment(id) if *id == payment.payee => {}
        Actor::Apartment(id) => {
            return Err(EngineError::Unauthorized(format!(
                "only {} or an admin can decide payment {}, not {}",
                payment.payee, payment.id, id
            )));
        }
    }
    payment.status = to;
    payment.approved_by = Some(actor.to_string());
    info!(payment = payment.id, status = %to, by = %actor, "payment decided");
    Ok(())
}

pub fn approve(payment: &mut Payment, actor: &Actor) -> EngineResult<()> {
    decide(payment, actor, PaymentStatus::Approved)
}

pub fn reject(payment: &mut Payment, actor: &Actor) -> EngineResult<()> {
    decide(payment, actor, PaymentStatus::Rejected)
}

/// Derives one apartment's sheet for a month.
///
/// Income is approved payments received; expenses are costs the apartment
/// fronted as payer plus approved payments it made. Pending and rejected
/// payments are ignored.
pub fn balance_sheet(
    apartment: &ApartmentId,
    month: &str,
    opening_balance: Decimal,
    expenses: &[Expense],
    payments: &[Payment],
) -> BalanceSheet {
    let approved = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Approved && p.month == month);

    let mut total_income = Decimal::ZERO;
    let mut total_expenses = Decimal::ZERO;
    for p in approved {
        if p.payee == *apartment {
            total_income += p.amount;
        }
        if p.payer == *apartment {
            total_expenses += p.amount;
        }
    }
    total_expenses += expenses
        .iter()
        .filter(|e| e.paid_by_apartment == *apartment && e.date.format("%Y-%m").to_string() == month)
        .map(|e| e.amount)
        .sum::<Decimal>();

    BalanceSheet {
        apartment: apartment.clone(),
        month: month.to_string(),
        opening_balance,
        total_income,
        total_expenses,
        closing_balance: opening_balance + total_income - total_expenses,
    }
}
