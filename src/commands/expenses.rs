// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use super::{actor, required, required_id};
use crate::config::load_config;
use crate::engine::tracker::{Actor, PaidUpdate, authorize_toggle, mark_paid, mark_unpaid};
use crate::models::{ApartmentId, Expense};
use crate::store::{
    insert_expense, load_apartments, load_expense, load_expenses, require_apartment, write_paid_by,
};
use crate::utils::{fmt_money, maybe_print_json, parse_date, parse_decimal, parse_month, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("mark-paid", sub)) => toggle(conn, sub, true)?,
        Some(("mark-unpaid", sub)) => toggle(conn, sub, false)?,
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let registry = load_apartments(conn)?;
    let config = load_config(conn)?;
    let payer = require_apartment(&registry, required(sub, "payer")?)?;
    let amount = parse_decimal(required(sub, "amount")?)?;
    let date = parse_date(required(sub, "date")?)?;
    let category = required(sub, "category")?.trim().to_string();
    let split = config
        .split_policy()
        .split(amount, &payer, &category, &registry)?;

    let mut expense = Expense {
        id: 0,
        description: required(sub, "description")?.trim().to_string(),
        amount,
        date,
        category,
        paid_by_apartment: payer,
        owed_by_apartments: split.owed_by_apartments,
        per_apartment_share: split.per_apartment_share,
        paid_by_apartments: Default::default(),
        receipt: sub.get_one::<String>("receipt").cloned(),
    };
    expense.id = insert_expense(conn, &expense)?;
    info!(expense = expense.id, payer = %expense.paid_by_apartment, "expense recorded");

    if expense.owed_by_apartments.is_empty() {
        println!(
            "Recorded expense {}: {} paid {} for '{}' (not split)",
            expense.id,
            expense.paid_by_apartment,
            fmt_money(&expense.amount),
            expense.description
        );
    } else {
        println!(
            "Recorded expense {}: {} paid {} for '{}', {} apartments owe {} each",
            expense.id,
            expense.paid_by_apartment,
            fmt_money(&expense.amount),
            expense.description,
            expense.owed_by_apartments.len(),
            fmt_money(&expense.per_apartment_share)
        );
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_expenses(conn, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|e| {
                let unpaid: Vec<String> = e.unpaid().map(ToString::to_string).collect();
                vec![
                    e.id.to_string(),
                    e.date.to_string(),
                    e.description.clone(),
                    e.category.clone(),
                    fmt_money(&e.amount),
                    e.paid_by_apartment.to_string(),
                    fmt_money(&e.per_apartment_share),
                    unpaid.join(","),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Date", "Description", "Category", "Amount", "Payer", "Share", "Unpaid"],
                rows,
            )
        );
    }
    Ok(())
}

/// Current-shape expenses, optionally narrowed to one apartment or month.
pub fn query_expenses(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<Expense>> {
    let registry = load_apartments(conn)?;
    let config = load_config(conn)?;
    let apartment = sub
        .get_one::<String>("apartment")
        .map(|a| require_apartment(&registry, a))
        .transpose()?;
    let month = sub
        .get_one::<String>("month")
        .map(|m| parse_month(m))
        .transpose()?;

    let mut data = load_expenses(conn, &registry, &config)?;
    if let Some(apt) = &apartment {
        data.retain(|e| e.paid_by_apartment == *apt || e.owed_by_apartments.contains(apt));
    }
    if let Some(month) = &month {
        data.retain(|e| e.date.format("%Y-%m").to_string() == *month);
    }
    Ok(data)
}

fn toggle(conn: &Connection, sub: &clap::ArgMatches, paid: bool) -> Result<()> {
    let registry = load_apartments(conn)?;
    let who = actor(sub, &registry)?;
    let target = require_apartment(&registry, required(sub, "apartment")?)?;
    let update = set_paid(conn, required_id(sub)?, &target, &who, paid)?;
    let state = if paid { "paid" } else { "unpaid" };
    if update.changed {
        println!("Expense {}: {} marked {}", update.expense_id, target, state);
    } else {
        println!("Expense {}: {} was already {}", update.expense_id, target, state);
    }
    Ok(())
}

/// Authorizes and applies one payment-flag toggle, persisting only `paid_by`.
/// Toggles for different apartments on the same expense never overwrite each other.
pub fn set_paid(
    conn: &Connection,
    expense_id: i64,
    target: &ApartmentId,
    who: &Actor,
    paid: bool,
) -> Result<PaidUpdate> {
    let registry = load_apartments(conn)?;
    let config = load_config(conn)?;
    let expense = load_expense(conn, expense_id, &registry, &config)?;
    authorize_toggle(who, &expense, target)?;
    let update = if paid {
        mark_paid(&expense, target)?
    } else {
        mark_unpaid(&expense, target)
    };
    // applied against the stored set, not the snapshot read above
    let applied = write_paid_by(conn, &update)?;
    if applied.changed {
        info!(expense = expense_id, apartment = %target, by = %who, paid, "payment flag updated");
    }
    Ok(applied)
}
