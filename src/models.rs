// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Stable short code of an apartment ("G1", "F2", ...). Codes are stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApartmentId(String);

impl ApartmentId {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApartmentId {
    fn from(s: &str) -> Self {
        ApartmentId::new(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apartment {
    pub id: ApartmentId,
    pub name: String,
}

impl Apartment {
    pub fn new(id: impl AsRef<str>, name: impl Into<String>) -> Self {
        Self {
            id: ApartmentId::new(id),
            name: name.into(),
        }
    }
}

/// An expense in its current shape, with split fields present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub category: String,
    pub paid_by_apartment: ApartmentId,
    pub owed_by_apartments: BTreeSet<ApartmentId>,
    pub per_apartment_share: Decimal,
    pub paid_by_apartments: BTreeSet<ApartmentId>,
    pub receipt: Option<String>,
}

impl Expense {
    /// Apartments that still owe their share on this expense.
    pub fn unpaid(&self) -> impl Iterator<Item = &ApartmentId> {
        self.owed_by_apartments
            .iter()
            .filter(|a| !self.paid_by_apartments.contains(*a))
    }

    /// Checks the two set invariants. Violations are reported, never repaired.
    pub fn check_invariants(&self) -> EngineResult<()> {
        if self.owed_by_apartments.contains(&self.paid_by_apartment) {
            return Err(EngineError::inconsistent(format!(
                "expense {} lists its payer {} among the owing apartments",
                self.id, self.paid_by_apartment
            )));
        }
        if let Some(stray) = self
            .paid_by_apartments
            .iter()
            .find(|a| !self.owed_by_apartments.contains(*a))
        {
            return Err(EngineError::inconsistent(format!(
                "expense {} marks {} as paid but {} does not owe on it",
                self.id, stray, stray
            )));
        }
        Ok(())
    }
}

/// An expense row written before split fields existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyExpense {
    pub id: i64,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub category: String,
    pub paid_by_apartment: ApartmentId,
    #[serde(default)]
    pub paid_by_apartments: BTreeSet<ApartmentId>,
    pub receipt: Option<String>,
}

/// Versioned view of a stored expense row.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredExpense {
    Legacy(LegacyExpense),
    Current(Expense),
}

impl StoredExpense {
    pub fn id(&self) -> i64 {
        match self {
            StoredExpense::Legacy(e) => e.id,
            StoredExpense::Current(e) => e.id,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, StoredExpense::Legacy(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "approved" => Ok(PaymentStatus::Approved),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(EngineError::invalid(format!(
                "unknown payment status '{}'",
                other
            ))),
        }
    }
}

/// Direct settlement between two apartments. Counts only once approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub payer: ApartmentId,
    pub payee: ApartmentId,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub month: String, // YYYY-MM
    pub receipt: Option<String>,
    pub approved_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub apartment: ApartmentId,
    pub month: String, // YYYY-MM
    pub opening_balance: Decimal,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub closing_balance: Decimal,
}
