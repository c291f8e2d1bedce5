// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Row mapping between SQLite and the engine types. Every read here is a
//! fresh snapshot; nothing is cached between calls.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use rust_decimal::Decimal;
use tracing::info;

use crate::config::EngineConfig;
use crate::engine::distribution::NotificationSink;
use crate::engine::migration::upgrade_all;
use crate::engine::notifications::{
    Addressing, NewNotification, Notification, NotificationKind, ReadState,
};
use crate::engine::polls::{Poll, PollOption};
use crate::engine::shared::ApartmentKeyed;
use crate::engine::tracker::PaidUpdate;
use crate::error::EngineError;
use crate::models::{
    Apartment, ApartmentId, BalanceSheet, Expense, LegacyExpense, Payment, PaymentStatus,
    StoredExpense,
};
use crate::utils::parse_decimal;

fn to_json_set(set: &BTreeSet<ApartmentId>) -> Result<String> {
    Ok(serde_json::to_string(set)?)
}

fn from_json_set(raw: &str, what: &str, id: i64) -> Result<BTreeSet<ApartmentId>> {
    serde_json::from_str(raw).with_context(|| format!("Invalid {} on expense {}", what, id))
}

// ---- apartments ----

pub fn load_apartments(conn: &Connection) -> Result<Vec<Apartment>> {
    let mut stmt = conn.prepare("SELECT id, name FROM apartments ORDER BY id")?;
    let rows = stmt.query_map([], |r| {
        Ok(Apartment {
            id: ApartmentId::new(r.get::<_, String>(0)?),
            name: r.get(1)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn insert_apartment(conn: &Connection, apartment: &Apartment) -> Result<()> {
    conn.execute(
        "INSERT INTO apartments(id, name) VALUES (?1, ?2)",
        params![apartment.id.as_str(), apartment.name],
    )
    .with_context(|| format!("Apartment '{}' could not be added", apartment.id))?;
    Ok(())
}

pub fn require_apartment(registry: &[Apartment], code: &str) -> Result<ApartmentId> {
    let id = ApartmentId::new(code);
    if registry.iter().any(|a| a.id == id) {
        Ok(id)
    } else {
        Err(EngineError::NotFound(format!("apartment {}", code.trim())).into())
    }
}

// ---- expenses ----

struct ExpenseRow {
    id: i64,
    description: String,
    amount: String,
    date: NaiveDate,
    category: String,
    paid_by_apartment: String,
    owed_by: Option<String>,
    per_apartment_share: Option<String>,
    paid_by: String,
    receipt: Option<String>,
}

const EXPENSE_COLUMNS: &str = "id, description, amount, date, category, paid_by_apartment, owed_by, per_apartment_share, paid_by, receipt";

fn expense_row(r: &Row<'_>) -> rusqlite::Result<ExpenseRow> {
    Ok(ExpenseRow {
        id: r.get(0)?,
        description: r.get(1)?,
        amount: r.get(2)?,
        date: r.get(3)?,
        category: r.get(4)?,
        paid_by_apartment: r.get(5)?,
        owed_by: r.get(6)?,
        per_apartment_share: r.get(7)?,
        paid_by: r.get(8)?,
        receipt: r.get(9)?,
    })
}

impl ExpenseRow {
    fn into_stored(self) -> Result<StoredExpense> {
        let amount = parse_decimal(&self.amount)
            .with_context(|| format!("Invalid amount on expense {}", self.id))?;
        let paid_by_apartments = from_json_set(&self.paid_by, "paid_by", self.id)?;
        match (self.owed_by, self.per_apartment_share) {
            (Some(owed), Some(share)) => Ok(StoredExpense::Current(Expense {
                id: self.id,
                description: self.description,
                amount,
                date: self.date,
                category: self.category,
                paid_by_apartment: ApartmentId::new(self.paid_by_apartment),
                owed_by_apartments: from_json_set(&owed, "owed_by", self.id)?,
                per_apartment_share: parse_decimal(&share)
                    .with_context(|| format!("Invalid share on expense {}", self.id))?,
                paid_by_apartments,
                receipt: self.receipt,
            })),
            _ => Ok(StoredExpense::Legacy(LegacyExpense {
                id: self.id,
                description: self.description,
                amount,
                date: self.date,
                category: self.category,
                paid_by_apartment: ApartmentId::new(self.paid_by_apartment),
                paid_by_apartments,
                receipt: self.receipt,
            })),
        }
    }
}

pub fn load_stored_expenses(conn: &Connection) -> Result<Vec<StoredExpense>> {
    let sql = format!("SELECT {} FROM expenses ORDER BY date, id", EXPENSE_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], expense_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?.into_stored()?);
    }
    Ok(out)
}

pub fn get_stored_expense(conn: &Connection, id: i64) -> Result<StoredExpense> {
    let sql = format!("SELECT {} FROM expenses WHERE id=?1", EXPENSE_COLUMNS);
    let row = conn
        .query_row(&sql, params![id], expense_row)
        .optional()?
        .ok_or_else(|| EngineError::NotFound(format!("expense {}", id)))?;
    row.into_stored()
}

/// Fetches every expense in current shape, backfilling legacy rows on the way.
pub fn load_expenses(
    conn: &Connection,
    registry: &[Apartment],
    config: &EngineConfig,
) -> Result<Vec<Expense>> {
    let stored = load_stored_expenses(conn)?;
    let outcome = upgrade_all(stored, &config.split_policy(), registry)?;
    if !outcome.upgraded.is_empty() {
        for e in outcome.current.iter().filter(|e| outcome.upgraded.contains(&e.id)) {
            write_split_fields(conn, e)?;
        }
        info!(count = outcome.upgraded.len(), "legacy expenses backfilled");
    }
    Ok(outcome.current)
}

/// Fetches one expense in current shape, backfilling it if it is legacy.
pub fn load_expense(
    conn: &Connection,
    id: i64,
    registry: &[Apartment],
    config: &EngineConfig,
) -> Result<Expense> {
    let outcome = upgrade_all(
        vec![get_stored_expense(conn, id)?],
        &config.split_policy(),
        registry,
    )?;
    let expense = outcome
        .current
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::NotFound(format!("expense {}", id)))?;
    if !outcome.upgraded.is_empty() {
        write_split_fields(conn, &expense)?;
    }
    Ok(expense)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BackfillReport {
    pub scanned: usize,
    pub upgraded: usize,
}

/// Writes split fields onto every legacy row. Running it twice is a no-op.
pub fn backfill_legacy(conn: &Connection, config: &EngineConfig) -> Result<BackfillReport> {
    let registry = load_apartments(conn)?;
    let stored = load_stored_expenses(conn)?;
    let scanned = stored.len();
    let legacy: Vec<StoredExpense> = stored.into_iter().filter(|e| e.is_legacy()).collect();
    if legacy.is_empty() {
        return Ok(BackfillReport { scanned, upgraded: 0 });
    }
    let outcome = upgrade_all(legacy, &config.split_policy(), &registry)?;
    let tx = conn.unchecked_transaction()?;
    for e in &outcome.current {
        write_split_fields(&tx, e)?;
    }
    tx.commit()?;
    info!(scanned, upgraded = outcome.upgraded.len(), "legacy backfill finished");
    Ok(BackfillReport {
        scanned,
        upgraded: outcome.upgraded.len(),
    })
}

pub fn insert_expense(conn: &Connection, e: &Expense) -> Result<i64> {
    conn.execute(
        "INSERT INTO expenses(description, amount, date, category, paid_by_apartment, owed_by, per_apartment_share, paid_by, receipt)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            e.description,
            e.amount.to_string(),
            e.date,
            e.category,
            e.paid_by_apartment.as_str(),
            to_json_set(&e.owed_by_apartments)?,
            e.per_apartment_share.to_string(),
            to_json_set(&e.paid_by_apartments)?,
            e.receipt,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Writes the split fields only; used by the legacy backfill.
pub fn write_split_fields(conn: &Connection, e: &Expense) -> Result<()> {
    conn.execute(
        "UPDATE expenses SET owed_by=?1, per_apartment_share=?2 WHERE id=?3 AND owed_by IS NULL",
        params![
            to_json_set(&e.owed_by_apartments)?,
            e.per_apartment_share.to_string(),
            e.id
        ],
    )?;
    Ok(())
}

/// Opens a write transaction up front so a read-modify-write cannot interleave
/// with another connection's.
fn immediate(conn: &Connection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}

/// Applies one apartment's paid flag to the stored set, leaving every other
/// member as it is in the database. Returns the update as actually applied.
pub fn write_paid_by(conn: &Connection, update: &PaidUpdate) -> Result<PaidUpdate> {
    let tx = immediate(conn)?;
    let raw: String = tx
        .query_row(
            "SELECT paid_by FROM expenses WHERE id=?1",
            params![update.expense_id],
            |r| r.get(0),
        )
        .optional()?
        .ok_or_else(|| EngineError::NotFound(format!("expense {}", update.expense_id)))?;
    let mut paid = from_json_set(&raw, "paid_by", update.expense_id)?;
    let changed = if update.paid {
        paid.insert(update.apartment.clone())
    } else {
        paid.remove(&update.apartment)
    };
    if changed {
        tx.execute(
            "UPDATE expenses SET paid_by=?1 WHERE id=?2",
            params![to_json_set(&paid)?, update.expense_id],
        )?;
    }
    tx.commit()?;
    Ok(PaidUpdate {
        paid_by_apartments: paid,
        changed,
        ..update.clone()
    })
}

// ---- payments ----

pub fn insert_payment(conn: &Connection, p: &Payment) -> Result<i64> {
    conn.execute(
        "INSERT INTO payments(payer, payee, amount, status, month, receipt, approved_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            p.payer.as_str(),
            p.payee.as_str(),
            p.amount.to_string(),
            p.status.as_str(),
            p.month,
            p.receipt,
            p.approved_by
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

type PaymentRow = (i64, String, String, String, String, String, Option<String>, Option<String>);

fn payment_from_row(row: PaymentRow) -> Result<Payment> {
    let (id, payer, payee, amount, status, month, receipt, approved_by) = row;
    Ok(Payment {
        id,
        payer: ApartmentId::new(payer),
        payee: ApartmentId::new(payee),
        amount: parse_decimal(&amount)
            .with_context(|| format!("Invalid amount on payment {}", id))?,
        status: status.parse::<PaymentStatus>()?,
        month,
        receipt,
        approved_by,
    })
}

const PAYMENT_SELECT: &str =
    "SELECT id, payer, payee, amount, status, month, receipt, approved_by FROM payments";

fn payment_tuple(r: &Row<'_>) -> rusqlite::Result<PaymentRow> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
    ))
}

pub fn load_payments(conn: &Connection) -> Result<Vec<Payment>> {
    let sql = format!("{} ORDER BY month, id", PAYMENT_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], payment_tuple)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(payment_from_row(row?)?);
    }
    Ok(out)
}

pub fn get_payment(conn: &Connection, id: i64) -> Result<Payment> {
    let sql = format!("{} WHERE id=?1", PAYMENT_SELECT);
    let row = conn
        .query_row(&sql, params![id], payment_tuple)
        .optional()?
        .ok_or_else(|| EngineError::NotFound(format!("payment {}", id)))?;
    payment_from_row(row)
}

/// Stores a decision on a payment that is still pending in the database.
pub fn write_payment_decision(conn: &Connection, p: &Payment) -> Result<()> {
    let n = conn.execute(
        "UPDATE payments SET status=?1, approved_by=?2 WHERE id=?3 AND status='pending'",
        params![p.status.as_str(), p.approved_by, p.id],
    )?;
    if n == 0 {
        return Err(EngineError::invalid(format!(
            "payment {} is no longer pending; nothing was changed",
            p.id
        ))
        .into());
    }
    Ok(())
}

// ---- balance sheets ----

/// Closing balance of the latest stored sheet strictly before `month`.
pub fn previous_closing(conn: &Connection, apartment: &ApartmentId, month: &str) -> Result<Decimal> {
    let v: Option<String> = conn
        .query_row(
            "SELECT closing_balance FROM balance_sheets WHERE apartment=?1 AND month<?2 ORDER BY month DESC LIMIT 1",
            params![apartment.as_str(), month],
            |r| r.get(0),
        )
        .optional()?;
    match v {
        Some(s) => parse_decimal(&s),
        None => Ok(Decimal::ZERO),
    }
}

pub fn upsert_sheet(conn: &Connection, s: &BalanceSheet) -> Result<()> {
    conn.execute(
        "INSERT INTO balance_sheets(apartment, month, opening_balance, total_income, total_expenses, closing_balance)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(apartment, month) DO UPDATE SET
            opening_balance=excluded.opening_balance,
            total_income=excluded.total_income,
            total_expenses=excluded.total_expenses,
            closing_balance=excluded.closing_balance",
        params![
            s.apartment.as_str(),
            s.month,
            s.opening_balance.to_string(),
            s.total_income.to_string(),
            s.total_expenses.to_string(),
            s.closing_balance.to_string()
        ],
    )?;
    Ok(())
}

pub fn load_sheets(conn: &Connection, month: Option<&str>) -> Result<Vec<BalanceSheet>> {
    let mut stmt = conn.prepare(
        "SELECT apartment, month, opening_balance, total_income, total_expenses, closing_balance
         FROM balance_sheets WHERE ?1 IS NULL OR month=?1 ORDER BY month, apartment",
    )?;
    let rows = stmt.query_map(params![month], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (apartment, month, opening, income, expenses, closing) = row?;
        out.push(BalanceSheet {
            apartment: ApartmentId::new(apartment),
            month,
            opening_balance: parse_decimal(&opening)?,
            total_income: parse_decimal(&income)?,
            total_expenses: parse_decimal(&expenses)?,
            closing_balance: parse_decimal(&closing)?,
        });
    }
    Ok(out)
}

// ---- notifications ----

pub fn insert_notification(conn: &Connection, n: &NewNotification) -> Result<i64> {
    let (recipient, read_state) = match &n.to {
        Addressing::Direct(id) => (Some(id.as_str().to_string()), None),
        Addressing::Broadcast(_) => match n.initial_read_state()? {
            ReadState::Broadcast(map) => (None, Some(serde_json::to_string(&map)?)),
            ReadState::Direct { .. } => return Err(anyhow!("broadcast produced a direct read state")),
        },
    };
    conn.execute(
        "INSERT INTO notifications(kind, title, body, recipient, is_read, read_state, from_apartment, amount, due_date, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            n.kind.as_str(),
            n.title,
            n.body,
            recipient,
            read_state,
            n.from.as_ref().map(|a| a.as_str().to_string()),
            n.amount.map(|a| a.to_string()),
            n.due_date,
            n.created_at,
            n.expires_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Notification sink backed by the local notifications table.
pub struct SqliteNotifications<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteNotifications<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl NotificationSink for SqliteNotifications<'_> {
    fn deliver(&mut self, notification: &NewNotification) -> Result<i64> {
        insert_notification(self.conn, notification)
    }
}

struct NotificationRow {
    id: i64,
    kind: String,
    title: String,
    body: String,
    recipient: Option<String>,
    is_read: bool,
    read_state: Option<String>,
    from_apartment: Option<String>,
    amount: Option<String>,
    due_date: Option<NaiveDate>,
    created_at: NaiveDateTime,
    expires_at: Option<NaiveDateTime>,
}

const NOTIFICATION_SELECT: &str = "SELECT id, kind, title, body, recipient, is_read, read_state, from_apartment, amount, due_date, created_at, expires_at FROM notifications";

fn notification_row(r: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: r.get(0)?,
        kind: r.get(1)?,
        title: r.get(2)?,
        body: r.get(3)?,
        recipient: r.get(4)?,
        is_read: r.get(5)?,
        read_state: r.get(6)?,
        from_apartment: r.get(7)?,
        amount: r.get(8)?,
        due_date: r.get(9)?,
        created_at: r.get(10)?,
        expires_at: r.get(11)?,
    })
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification> {
        let read = match (self.recipient, self.read_state) {
            (Some(to), None) => ReadState::Direct {
                to: ApartmentId::new(to),
                is_read: self.is_read,
            },
            (None, Some(raw)) => {
                let map: ApartmentKeyed<bool> = serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid read state on notification {}", self.id))?;
                ReadState::Broadcast(map)
            }
            _ => return Err(anyhow!("Notification {} has no valid addressing", self.id)),
        };
        Ok(Notification {
            id: self.id,
            kind: self.kind.parse::<NotificationKind>()?,
            title: self.title,
            body: self.body,
            read,
            from: self.from_apartment.map(ApartmentId::new),
            amount: self.amount.as_deref().map(parse_decimal).transpose()?,
            due_date: self.due_date,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

pub fn load_notifications(conn: &Connection) -> Result<Vec<Notification>> {
    let sql = format!("{} ORDER BY created_at DESC, id DESC", NOTIFICATION_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], notification_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?.into_notification()?);
    }
    Ok(out)
}

pub fn get_notification(conn: &Connection, id: i64) -> Result<Notification> {
    let sql = format!("{} WHERE id=?1", NOTIFICATION_SELECT);
    conn.query_row(&sql, params![id], notification_row)
        .optional()?
        .ok_or_else(|| EngineError::NotFound(format!("notification {}", id)))?
        .into_notification()
}

/// Marks a notification read for one apartment against the stored state.
/// Returns whether anything changed.
pub fn write_read_mark(conn: &Connection, id: i64, apartment: &ApartmentId) -> Result<bool> {
    let tx = immediate(conn)?;
    let mut n = get_notification(&tx, id)?;
    let changed = n.mark_read(apartment)?;
    if changed {
        match &n.read {
            ReadState::Direct { .. } => tx.execute(
                "UPDATE notifications SET is_read=1 WHERE id=?1",
                params![id],
            )?,
            ReadState::Broadcast(map) => tx.execute(
                "UPDATE notifications SET read_state=?1 WHERE id=?2",
                params![serde_json::to_string(map)?, id],
            )?,
        };
    }
    tx.commit()?;
    Ok(changed)
}

// ---- polls ----

/// Stores a poll built with a placeholder id and returns the assigned id.
pub fn insert_poll(conn: &Connection, poll: &Poll) -> Result<i64> {
    conn.execute(
        "INSERT INTO polls(question, options, votes, is_active) VALUES (?1, ?2, ?3, ?4)",
        params![
            poll.question,
            serde_json::to_string(&poll.options)?,
            serde_json::to_string(&poll.votes)?,
            poll.is_active
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_poll(conn: &Connection, id: i64) -> Result<Poll> {
    let row: Option<(String, String, String, bool)> = conn
        .query_row(
            "SELECT question, options, votes, is_active FROM polls WHERE id=?1",
            params![id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    let (question, options, votes, is_active) =
        row.ok_or_else(|| EngineError::NotFound(format!("poll {}", id)))?;
    let options: Vec<PollOption> =
        serde_json::from_str(&options).with_context(|| format!("Invalid options on poll {}", id))?;
    let votes: BTreeMap<ApartmentId, Option<String>> =
        serde_json::from_str(&votes).with_context(|| format!("Invalid votes on poll {}", id))?;
    Ok(Poll {
        id,
        question,
        options,
        votes: ApartmentKeyed::from_entries(votes)?,
        is_active,
    })
}

pub fn list_poll_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM polls ORDER BY id DESC")?;
    let rows = stmt.query_map([], |r| r.get::<_, i64>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Runs `f` on the stored poll and writes back its votes and state, all in
/// one write transaction so votes from other connections are never lost.
pub fn update_poll<T>(
    conn: &Connection,
    id: i64,
    f: impl FnOnce(&mut Poll) -> Result<T>,
) -> Result<T> {
    let tx = immediate(conn)?;
    let mut poll = get_poll(&tx, id)?;
    let out = f(&mut poll)?;
    tx.execute(
        "UPDATE polls SET votes=?1, is_active=?2 WHERE id=?3",
        params![serde_json::to_string(&poll.votes)?, poll.is_active, poll.id],
    )?;
    tx.commit()?;
    Ok(out)
}
