// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;
use tracing::warn;

use crate::config::load_config;
use crate::engine::migration::upgrade_expense;
use crate::models::{ApartmentId, StoredExpense};
use crate::store::{backfill_legacy, load_apartments, load_payments, load_stored_expenses};
use crate::utils::pretty_table;

pub fn migrate(conn: &Connection) -> Result<()> {
    let config = load_config(conn)?;
    let report = backfill_legacy(conn, &config)?;
    println!(
        "Scanned {} expenses, backfilled {} legacy rows",
        report.scanned, report.upgraded
    );
    Ok(())
}

pub fn handle(conn: &Connection) -> Result<()> {
    let rows = diagnose(conn)?;
    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

/// Lists problems in stored data without changing anything.
pub fn diagnose(conn: &Connection) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let registry = load_apartments(conn)?;
    if registry.is_empty() {
        rows.push(vec!["empty_registry".into(), "no apartments registered".into()]);
        return Ok(rows);
    }
    let config = load_config(conn)?;
    let known = |id: &ApartmentId| registry.iter().any(|a| &a.id == id);

    let stored = load_stored_expenses(conn)?;
    let legacy = stored.iter().filter(|e| e.is_legacy()).count();
    if legacy > 0 {
        rows.push(vec![
            "legacy_expenses".into(),
            format!("{} rows lack split fields; run `migrate`", legacy),
        ]);
    }

    // upgraded in memory only
    let policy = config.split_policy();
    for row in stored {
        let id = row.id();
        let e = match row {
            StoredExpense::Current(e) => e,
            StoredExpense::Legacy(l) => match upgrade_expense(l, &policy, &registry) {
                Ok(e) => e,
                Err(err) => {
                    rows.push(vec![
                        "legacy_not_upgradable".into(),
                        format!("expense {}: {}", id, err),
                    ]);
                    continue;
                }
            },
        };
        if let Err(err) = e.check_invariants() {
            warn!(expense = e.id, error = %err, "inconsistent expense");
            rows.push(vec!["inconsistent_expense".into(), err.to_string()]);
        }
        for apt in std::iter::once(&e.paid_by_apartment).chain(e.owed_by_apartments.iter()) {
            if !known(apt) {
                rows.push(vec![
                    "unknown_apartment".into(),
                    format!("expense {} references {}", e.id, apt),
                ]);
            }
        }
    }

    for p in load_payments(conn)? {
        for apt in [&p.payer, &p.payee] {
            if !known(apt) {
                rows.push(vec![
                    "unknown_apartment".into(),
                    format!("payment {} references {}", p.id, apt),
                ]);
            }
        }
    }
    Ok(rows)
}
