// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use rusqlite::Connection;

use crate::config::load_config;
use crate::engine::balance::{ApartmentBalance, BalanceReport, compute_balances};
use crate::store::{load_apartments, load_expenses, require_apartment};
use crate::utils::{fmt_money, maybe_print_json, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    if let Some(("show", sub)) = m.subcommand() {
        show(conn, sub)?;
    }
    Ok(())
}

/// Recomputes every balance from the stored expenses. Nothing is cached.
pub fn current_report(conn: &Connection) -> Result<BalanceReport> {
    let registry = load_apartments(conn)?;
    let config = load_config(conn)?;
    let expenses = load_expenses(conn, &registry, &config)?;
    Ok(compute_balances(&expenses, &registry)?)
}

fn status(b: &ApartmentBalance) -> &'static str {
    if b.is_settled() {
        "settled"
    } else if b.balance.is_sign_positive() {
        "is owed"
    } else {
        "owes"
    }
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let report = current_report(conn)?;

    if let Some(code) = sub.get_one::<String>("apartment") {
        let registry = load_apartments(conn)?;
        let id = require_apartment(&registry, code)?;
        let bal = report
            .get(&id)
            .ok_or_else(|| anyhow!("No balance for apartment {}", id))?;
        if !maybe_print_json(json_flag, jsonl_flag, bal)? {
            let mut rows = Vec::new();
            for (other, amt) in &bal.owes {
                rows.push(vec!["owes".to_string(), other.to_string(), fmt_money(amt)]);
            }
            for (other, amt) in &bal.is_owed {
                rows.push(vec!["is owed by".to_string(), other.to_string(), fmt_money(amt)]);
            }
            println!("{}", pretty_table(&["Direction", "Apartment", "Amount"], rows));
            println!("Net balance for {}: {} ({})", id, fmt_money(&bal.balance), status(bal));
        }
        return Ok(());
    }

    let data: Vec<&ApartmentBalance> = report.iter().collect();
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .iter()
            .map(|b| {
                vec![
                    b.apartment.to_string(),
                    fmt_money(&b.balance),
                    fmt_money(&b.total_owes()),
                    fmt_money(&b.total_is_owed()),
                    status(b).to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Apartment", "Balance", "Owes", "Is owed", "Status"], rows)
        );
    }
    Ok(())
}
