// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{required, required_id};
use crate::engine::notifications::{NewNotification, NotificationKind};
use crate::models::ApartmentId;
use crate::store::{
    insert_notification, load_apartments, load_notifications, require_apartment,
    write_read_mark,
};
use crate::utils::{fmt_money, maybe_print_json, parse_date, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("broadcast", sub)) => {
            let expires = sub
                .get_one::<String>("expires")
                .map(|d| parse_date(d))
                .transpose()?;
            let id = broadcast(
                conn,
                required(sub, "title")?,
                required(sub, "body")?,
                expires,
            )?;
            println!("Announcement {} sent to every apartment", id);
        }
        Some(("list", sub)) => {
            let registry = load_apartments(conn)?;
            let apt = require_apartment(&registry, required(sub, "apartment")?)?;
            let data = inbox(conn, &apt, sub.get_flag("all"), Local::now().naive_local())?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .iter()
                    .map(|n| {
                        vec![
                            n.id.to_string(),
                            n.created_at.format("%Y-%m-%d %H:%M").to_string(),
                            n.kind.to_string(),
                            n.title.clone(),
                            n.body.clone(),
                            n.amount.as_ref().map(fmt_money).unwrap_or_default(),
                            if n.read { "yes" } else { "no" }.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["ID", "Created", "Kind", "Title", "Message", "Amount", "Read"],
                        rows,
                    )
                );
            }
        }
        Some(("read", sub)) => {
            let registry = load_apartments(conn)?;
            let apt = require_apartment(&registry, required(sub, "apartment")?)?;
            let id = required_id(sub)?;
            if mark_read(conn, id, &apt)? {
                println!("Notification {} marked read for {}", id, apt);
            } else {
                println!("Notification {} was already read by {}", id, apt);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Stores one announcement addressed to every registered apartment.
pub fn broadcast(
    conn: &Connection,
    title: &str,
    body: &str,
    expires: Option<NaiveDate>,
) -> Result<i64> {
    let registry = load_apartments(conn)?;
    let expires_at = expires
        .map(|d| {
            d.and_hms_opt(23, 59, 59)
                .with_context(|| format!("Invalid expiry date {}", d))
        })
        .transpose()?;
    let note = NewNotification::broadcast(
        NotificationKind::Announcement,
        registry.into_iter().map(|a| a.id),
        title.trim(),
        body.trim(),
        Local::now().naive_local(),
        expires_at,
    )?;
    insert_notification(conn, &note)
}

/// A notification as one apartment sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboxItem {
    pub id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub from: Option<ApartmentId>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub read: bool,
}

/// Notifications addressed to `apartment`, newest first. Unless `include_all`,
/// read and expired ones are left out.
pub fn inbox(
    conn: &Connection,
    apartment: &ApartmentId,
    include_all: bool,
    now: NaiveDateTime,
) -> Result<Vec<InboxItem>> {
    let mut out = Vec::new();
    for n in load_notifications(conn)? {
        let Some(read) = n.read.is_read_by(apartment) else {
            continue;
        };
        if !include_all && (read || n.is_expired(now)) {
            continue;
        }
        out.push(InboxItem {
            id: n.id,
            kind: n.kind,
            title: n.title,
            body: n.body,
            from: n.from,
            amount: n.amount,
            due_date: n.due_date,
            created_at: n.created_at,
            read,
        });
    }
    Ok(out)
}

/// Marks a notification read for one apartment. Returns whether anything changed.
pub fn mark_read(conn: &Connection, id: i64, apartment: &ApartmentId) -> Result<bool> {
    write_read_mark(conn, id, apartment)
}
