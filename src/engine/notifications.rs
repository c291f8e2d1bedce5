// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::shared::ApartmentKeyed;
use crate::error::{EngineError, EngineResult};
use crate::models::ApartmentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PaymentRequest,
    Announcement,
    PaymentUpdate,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PaymentRequest => "payment_request",
            NotificationKind::Announcement => "announcement",
            NotificationKind::PaymentUpdate => "payment_update",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment_request" => Ok(NotificationKind::PaymentRequest),
            "announcement" => Ok(NotificationKind::Announcement),
            "payment_update" => Ok(NotificationKind::PaymentUpdate),
            other => Err(EngineError::invalid(format!(
                "unknown notification kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addressing {
    Direct(ApartmentId),
    Broadcast(Vec<ApartmentId>),
}

/// A notification that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub to: Addressing,
    pub title: String,
    pub body: String,
    pub from: Option<ApartmentId>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
}

impl NewNotification {
    pub fn direct(
        kind: NotificationKind,
        to: ApartmentId,
        title: impl Into<String>,
        body: impl Into<String>,
        created_at: NaiveDateTime,
        expires_at: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            kind,
            to: Addressing::Direct(to),
            title: title.into(),
            body: body.into(),
            from: None,
            amount: None,
            due_date: None,
            created_at,
            expires_at,
        }
    }

    pub fn broadcast<I>(
        kind: NotificationKind,
        to: I,
        title: impl Into<String>,
        body: impl Into<String>,
        created_at: NaiveDateTime,
        expires_at: Option<NaiveDateTime>,
    ) -> EngineResult<Self>
    where
        I: IntoIterator<Item = ApartmentId>,
    {
        let members: BTreeSet<ApartmentId> = to.into_iter().collect();
        if members.is_empty() {
            return Err(EngineError::invalid("broadcast needs at least one recipient"));
        }
        Ok(Self {
            kind,
            to: Addressing::Broadcast(members.into_iter().collect()),
            title: title.into(),
            body: body.into(),
            from: None,
            amount: None,
            due_date: None,
            created_at,
            expires_at,
        })
    }

    pub fn with_request(mut self, from: ApartmentId, amount: Decimal, due_date: NaiveDate) -> Self {
        self.from = Some(from);
        self.amount = Some(amount);
        self.due_date = Some(due_date);
        self
    }

    pub fn recipients(&self) -> &[ApartmentId] {
        match &self.to {
            Addressing::Direct(id) => std::slice::from_ref(id),
            Addressing::Broadcast(ids) => ids,
        }
    }

    /// Read state every stored notification starts with: unread for each recipient.
    pub fn initial_read_state(&self) -> EngineResult<ReadState> {
        Ok(match &self.to {
            Addressing::Direct(id) => ReadState::Direct {
                to: id.clone(),
                is_read: false,
            },
            Addressing::Broadcast(ids) => {
                ReadState::Broadcast(ApartmentKeyed::new(ids.iter().cloned(), false)?)
            }
        })
    }

    pub fn into_notification(self, id: i64) -> EngineResult<Notification> {
        let read = self.initial_read_state()?;
        Ok(Notification {
            id,
            kind: self.kind,
            title: self.title,
            body: self.body,
            read,
            from: self.from,
            amount: self.amount,
            due_date: self.due_date,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReadState {
    Direct { to: ApartmentId, is_read: bool },
    Broadcast(ApartmentKeyed<bool>),
}

impl ReadState {
    pub fn is_read_by(&self, apartment: &ApartmentId) -> Option<bool> {
        match self {
            ReadState::Direct { to, is_read } if to == apartment => Some(*is_read),
            ReadState::Direct { .. } => None,
            ReadState::Broadcast(map) => map.get(apartment).copied(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read: ReadState,
    pub from: Option<ApartmentId>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
}

impl Notification {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    /// Marks the notification read for one apartment. Returns whether anything changed.
    pub fn mark_read(&mut self, apartment: &ApartmentId) -> EngineResult<bool> {
        match &mut self.read {
            ReadState::Direct { to, is_read } => {
                if *to != *apartment {
                    return Err(EngineError::NotAddressed(apartment.clone()));
                }
                let changed = !*is_read;
                *is_read = true;
                Ok(changed)
            }
            ReadState::Broadcast(map) => Ok(!map.set(apartment, true)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn seven() -> Vec<ApartmentId> {
        ["G1", "F1", "F2", "S1", "S2", "T1", "T2"]
            .iter()
            .map(|c| ApartmentId::new(c))
            .collect()
    }

    #[test]
    fn broadcast_starts_with_one_unread_entry_each() {
        let n = NewNotification::broadcast(
            NotificationKind::Announcement,
            seven(),
            "Water shut-off",
            "Tuesday 10:00-12:00",
            now(),
            None,
        )
        .unwrap()
        .into_notification(1)
        .unwrap();
        match &n.read {
            ReadState::Broadcast(map) => {
                assert_eq!(map.len(), 7);
                assert_eq!(map.count_where(|r| !*r), 7);
            }
            other => panic!("expected broadcast read state, got {:?}", other),
        }
    }

    #[test]
    fn marking_one_reader_changes_one_entry() {
        let mut n = NewNotification::broadcast(
            NotificationKind::Announcement,
            seven(),
            "Meeting",
            "Friday",
            now(),
            None,
        )
        .unwrap()
        .into_notification(1)
        .unwrap();
        assert!(n.mark_read(&"T2".into()).unwrap());
        assert!(!n.mark_read(&"T2".into()).unwrap());
        assert_eq!(n.read.is_read_by(&"T2".into()), Some(true));
        for other in ["G1", "F1", "F2", "S1", "S2", "T1"] {
            assert_eq!(n.read.is_read_by(&other.into()), Some(false));
        }
    }

    #[test]
    fn direct_notification_rejects_other_readers() {
        let mut n = NewNotification::direct(
            NotificationKind::PaymentRequest,
            "F1".into(),
            "Payment request",
            "pay up",
            now(),
            None,
        )
        .into_notification(4)
        .unwrap();
        assert!(matches!(
            n.mark_read(&"F2".into()),
            Err(EngineError::NotAddressed(_))
        ));
        assert!(n.mark_read(&"F1".into()).unwrap());
        assert_eq!(n.read.is_read_by(&"F2".into()), None);
    }

    #[test]
    fn expiry_is_inclusive() {
        let n = NewNotification::direct(
            NotificationKind::Announcement,
            "F1".into(),
            "t",
            "b",
            now(),
            Some(now()),
        )
        .into_notification(2)
        .unwrap();
        assert!(n.is_expired(now()));
        assert!(!n.is_expired(now() - chrono::Duration::seconds(1)));
    }

    #[test]
    fn duplicate_broadcast_recipients_collapse() {
        let n = NewNotification::broadcast(
            NotificationKind::Announcement,
            vec![
                ApartmentId::new("F1"),
                ApartmentId::new("f1"),
                ApartmentId::new("G1"),
            ],
            "t",
            "b",
            now(),
            None,
        )
        .unwrap();
        assert_eq!(n.recipients().len(), 2);
    }
}
