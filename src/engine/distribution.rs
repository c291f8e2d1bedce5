// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! One-off payment requests that reuse the expense split rule without
//! recording an expense.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::notifications::{NewNotification, NotificationKind};
use crate::engine::split::SplitPolicy;
use crate::error::{EngineError, EngineResult};
use crate::models::{Apartment, ApartmentId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareLine {
    pub apartment: Apartment,
    pub share: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionPreview {
    pub payer: ApartmentId,
    pub category: String,
    pub amount: Decimal,
    /// Sum owed by apartments other than the payer.
    pub total_amount: Decimal,
    pub other_apartments: Vec<ShareLine>,
    pub total_with_payer_share: Decimal,
}

/// Category used when the caller gives none; always a split category.
pub const DEFAULT_REQUEST_CATEGORY: &str = "general";

pub fn preview(
    policy: &SplitPolicy,
    amount: Decimal,
    payer: &ApartmentId,
    registry: &[Apartment],
    category: Option<&str>,
) -> EngineResult<DistributionPreview> {
    let category = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_REQUEST_CATEGORY);
    let split = policy.split(amount, payer, category, registry)?;

    let other_apartments: Vec<ShareLine> = registry
        .iter()
        .filter(|a| split.owed_by_apartments.contains(&a.id))
        .map(|a| ShareLine {
            apartment: a.clone(),
            share: split.per_apartment_share,
        })
        .collect();
    let total_amount = split.total_owed_by_others();

    Ok(DistributionPreview {
        payer: payer.clone(),
        category: category.to_string(),
        amount,
        total_amount,
        other_apartments,
        total_with_payer_share: total_amount + split.payer_share(amount),
    })
}

/// Outbound side of a payment request fan-out.
pub trait NotificationSink {
    fn deliver(&mut self, notification: &NewNotification) -> anyhow::Result<i64>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    pub due_date: Option<NaiveDate>,
    pub sent: Vec<(ApartmentId, i64)>,
    pub failed: Vec<(ApartmentId, String)>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.sent.is_empty() && !self.failed.is_empty()
    }
}

/// `today + due_days`, refusing negative offsets and dates past the calendar range.
pub fn default_due_date(today: NaiveDate, due_days: i64) -> EngineResult<NaiveDate> {
    u64::try_from(due_days)
        .ok()
        .and_then(|d| today.checked_add_days(Days::new(d)))
        .ok_or_else(|| {
            EngineError::invalid(format!("request_due_days {} gives no valid due date", due_days))
        })
}

/// Sends one request per owing apartment. Failures are collected, not rolled back.
pub fn dispatch<S: NotificationSink>(
    preview: &DistributionPreview,
    due_date: NaiveDate,
    description: &str,
    created_at: chrono::NaiveDateTime,
    sink: &mut S,
) -> DispatchReport {
    let mut report = DispatchReport {
        due_date: Some(due_date),
        ..DispatchReport::default()
    };
    for line in &preview.other_apartments {
        if line.apartment.id == preview.payer {
            continue;
        }
        let note = NewNotification::direct(
            NotificationKind::PaymentRequest,
            line.apartment.id.clone(),
            format!("Payment request from {}", preview.payer),
            format!(
                "{}: your share is {:.2}, due {}",
                description, line.share, due_date
            ),
            created_at,
            None,
        )
        .with_request(preview.payer.clone(), line.share, due_date);
        match sink.deliver(&note) {
            Ok(id) => report.sent.push((line.apartment.id.clone(), id)),
            Err(err) => {
                warn!(to = %line.apartment.id, error = %err, "payment request not delivered");
                report.failed.push((line.apartment.id.clone(), err.to_string()));
            }
        }
    }
    info!(
        payer = %preview.payer,
        sent = report.sent.len(),
        failed = report.failed.len(),
        "payment requests dispatched"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn registry() -> Vec<Apartment> {
        ["G1", "F1", "F2", "S1", "S2", "T1", "T2"]
            .iter()
            .map(|c| Apartment::new(c, format!("Apartment {}", c)))
            .collect()
    }

    fn policy() -> SplitPolicy {
        SplitPolicy::new(["cleaning"])
    }

    #[derive(Default)]
    struct Recorder {
        delivered: Vec<NewNotification>,
        fail_for: Option<ApartmentId>,
    }

    impl NotificationSink for Recorder {
        fn deliver(&mut self, n: &NewNotification) -> anyhow::Result<i64> {
            let to = n.recipients().first().cloned();
            if to.is_some() && to == self.fail_for {
                return Err(anyhow!("push gateway unavailable"));
            }
            self.delivered.push(n.clone());
            Ok(self.delivered.len() as i64)
        }
    }

    fn now() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn preview_splits_between_others() {
        let p = preview(&policy(), Decimal::from(350), &"S2".into(), &registry(), None).unwrap();
        assert_eq!(p.other_apartments.len(), 6);
        assert!(p.other_apartments.iter().all(|l| l.share == Decimal::from(50)));
        assert_eq!(p.total_amount, Decimal::from(300));
        assert_eq!(p.total_with_payer_share, Decimal::from(350));
        assert_eq!(p.category, DEFAULT_REQUEST_CATEGORY);
    }

    #[test]
    fn preview_honours_exemption() {
        let p = preview(
            &policy(),
            Decimal::from(90),
            &"S2".into(),
            &registry(),
            Some("cleaning"),
        )
        .unwrap();
        assert!(p.other_apartments.is_empty());
        assert!(p.total_amount.is_zero());
        assert_eq!(p.total_with_payer_share, Decimal::from(90));
    }

    #[test]
    fn dispatch_skips_payer_and_sets_due_date() {
        let p = preview(&policy(), Decimal::from(70), &"G1".into(), &registry(), None).unwrap();
        let due = default_due_date(now().date(), 7).unwrap();
        let mut sink = Recorder::default();
        let report = dispatch(&p, due, "Plumber", now(), &mut sink);
        assert!(report.is_complete());
        assert_eq!(report.sent.len(), 6);
        assert_eq!(due, NaiveDate::from_ymd_opt(2025, 5, 8).unwrap());
        for n in &sink.delivered {
            assert_ne!(n.recipients(), &[ApartmentId::new("G1")][..]);
            assert_eq!(n.amount, Some(Decimal::from(10)));
            assert_eq!(n.due_date, Some(due));
        }
    }

    #[test]
    fn due_date_out_of_range_is_rejected() {
        let today = now().date();
        assert!(default_due_date(today, i64::MAX).is_err());
        assert!(default_due_date(today, -1).is_err());
        assert_eq!(default_due_date(today, 0).unwrap(), today);
    }

    #[test]
    fn dispatch_reports_partial_failure() {
        let p = preview(&policy(), Decimal::from(70), &"G1".into(), &registry(), None).unwrap();
        let mut sink = Recorder {
            fail_for: Some("T1".into()),
            ..Recorder::default()
        };
        let report = dispatch(&p, now().date(), "Plumber", now(), &mut sink);
        assert!(report.is_partial());
        assert_eq!(report.sent.len(), 5);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, ApartmentId::new("T1"));
        assert_eq!(sink.delivered.len(), 5);
    }
}
