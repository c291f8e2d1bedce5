// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::Connection;

use super::required;
use crate::config::load_config;
use crate::models::ApartmentId;
use crate::store::{load_apartments, load_expenses};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    if let Some(("expenses", sub)) = m.subcommand() {
        let fmt = required(sub, "format")?;
        let out = required(sub, "out")?;
        let n = export_expenses(conn, fmt, Path::new(out))?;
        println!("Exported {} expenses to {}", n, out);
    }
    Ok(())
}

fn join(set: &std::collections::BTreeSet<ApartmentId>) -> String {
    set.iter().map(ApartmentId::as_str).collect::<Vec<_>>().join(";")
}

/// Writes every expense (legacy rows backfilled first) as CSV or JSON.
pub fn export_expenses(conn: &Connection, format: &str, out: &Path) -> Result<usize> {
    let registry = load_apartments(conn)?;
    let config = load_config(conn)?;
    let expenses = load_expenses(conn, &registry, &config)?;

    match format.trim().to_lowercase().as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)
                .with_context(|| format!("Cannot write {}", out.display()))?;
            wtr.write_record([
                "id",
                "date",
                "description",
                "category",
                "amount",
                "paid_by_apartment",
                "owed_by_apartments",
                "per_apartment_share",
                "paid_by_apartments",
                "receipt",
            ])?;
            for e in &expenses {
                wtr.write_record([
                    e.id.to_string(),
                    e.date.to_string(),
                    e.description.clone(),
                    e.category.clone(),
                    e.amount.to_string(),
                    e.paid_by_apartment.to_string(),
                    join(&e.owed_by_apartments),
                    e.per_apartment_share.to_string(),
                    join(&e.paid_by_apartments),
                    e.receipt.clone().unwrap_or_default(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            std::fs::write(out, serde_json::to_string_pretty(&expenses)?)
                .with_context(|| format!("Cannot write {}", out.display()))?;
        }
        other => bail!("Unknown format: {} (use csv|json)", other),
    }
    Ok(expenses.len())
}
