// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use super::required;
use crate::config::load_config;
use crate::engine::payments::balance_sheet;
use crate::models::BalanceSheet;
use crate::store::{
    load_apartments, load_expenses, load_payments, load_sheets, previous_closing, upsert_sheet,
};
use crate::utils::{fmt_money, maybe_print_json, parse_month, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("close", sub)) => {
            let month = parse_month(required(sub, "month")?)?;
            let sheets = close_month(conn, &month)?;
            print_sheets(&sheets);
        }
        Some(("list", sub)) => {
            let month = sub
                .get_one::<String>("month")
                .map(|m| parse_month(m))
                .transpose()?;
            let data = load_sheets(conn, month.as_deref())?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                print_sheets(&data);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Derives and stores every apartment's sheet for `month`. Re-closing a month overwrites it.
pub fn close_month(conn: &Connection, month: &str) -> Result<Vec<BalanceSheet>> {
    let registry = load_apartments(conn)?;
    let config = load_config(conn)?;
    let expenses = load_expenses(conn, &registry, &config)?;
    let payments = load_payments(conn)?;

    let tx = conn.unchecked_transaction()?;
    let mut out = Vec::with_capacity(registry.len());
    for apt in &registry {
        let opening = previous_closing(&tx, &apt.id, month)?;
        let sheet = balance_sheet(&apt.id, month, opening, &expenses, &payments);
        upsert_sheet(&tx, &sheet)?;
        out.push(sheet);
    }
    tx.commit()?;
    info!(month, apartments = out.len(), "month closed");
    Ok(out)
}

fn print_sheets(sheets: &[BalanceSheet]) {
    let rows = sheets
        .iter()
        .map(|s| {
            vec![
                s.month.clone(),
                s.apartment.to_string(),
                fmt_money(&s.opening_balance),
                fmt_money(&s.total_income),
                fmt_money(&s.total_expenses),
                fmt_money(&s.closing_balance),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Month", "Apartment", "Opening", "Income", "Expenses", "Closing"],
            rows,
        )
    );
}
