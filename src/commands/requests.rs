// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, bail};
use chrono::Local;
use rusqlite::Connection;

use super::required;
use crate::config::load_config;
use crate::engine::distribution::{
    DispatchReport, DistributionPreview, default_due_date, dispatch, preview,
};
use crate::store::{SqliteNotifications, load_apartments, require_apartment};
use crate::utils::{fmt_money, maybe_print_json, parse_date, parse_decimal, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("preview", sub)) => {
            let p = build_preview(conn, sub)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &p)? {
                print_preview(&p);
            }
        }
        Some(("send", sub)) => {
            let report = send(conn, sub)?;
            if report.sent.is_empty() && report.failed.is_empty() {
                println!("Nobody else owes a share; no requests sent");
            }
            for (apt, id) in &report.sent {
                println!("Requested from {} (notification {})", apt, id);
            }
            for (apt, err) in &report.failed {
                eprintln!("Could not notify {}: {}", apt, err);
            }
            if report.is_partial() {
                bail!(
                    "{} of {} requests failed; the others were sent",
                    report.failed.len(),
                    report.sent.len() + report.failed.len()
                );
            }
            if !report.is_complete() {
                bail!("No payment request could be delivered");
            }
        }
        _ => {}
    }
    Ok(())
}

fn build_preview(conn: &Connection, sub: &clap::ArgMatches) -> Result<DistributionPreview> {
    let registry = load_apartments(conn)?;
    let config = load_config(conn)?;
    let payer = require_apartment(&registry, required(sub, "payer")?)?;
    let amount = parse_decimal(required(sub, "amount")?)?;
    let category = sub.get_one::<String>("category").map(String::as_str);
    Ok(preview(&config.split_policy(), amount, &payer, &registry, category)?)
}

fn print_preview(p: &DistributionPreview) {
    let rows = p
        .other_apartments
        .iter()
        .map(|l| {
            vec![
                l.apartment.id.to_string(),
                l.apartment.name.clone(),
                fmt_money(&l.share),
            ]
        })
        .collect();
    println!("{}", pretty_table(&["Apartment", "Name", "Share"], rows));
    println!(
        "{} pays {} ({}): others owe {}, total with payer's share {}",
        p.payer,
        fmt_money(&p.amount),
        p.category,
        fmt_money(&p.total_amount),
        fmt_money(&p.total_with_payer_share)
    );
}

/// Creates one payment-request notification per owing apartment.
pub fn send(conn: &Connection, sub: &clap::ArgMatches) -> Result<DispatchReport> {
    let config = load_config(conn)?;
    let p = build_preview(conn, sub)?;
    let now = Local::now().naive_local();
    let due = match sub.get_one::<String>("due") {
        Some(d) => parse_date(d)?,
        None => default_due_date(now.date(), config.request_due_days)?,
    };
    let description = required(sub, "description")?.trim();
    let mut sink = SqliteNotifications::new(conn);
    Ok(dispatch(&p, due, description, now, &mut sink))
}
