// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use aptsplit::commands::{apartments, balances, doctor};
use aptsplit::config::{EngineConfig, load_config};
use aptsplit::db;
use aptsplit::models::{ApartmentId, StoredExpense};
use aptsplit::store::{backfill_legacy, load_stored_expenses};
use rusqlite::Connection;
use rust_decimal::Decimal;

/// A database as written before expenses carried split fields.
fn old_db() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE expenses(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            category TEXT NOT NULL,
            paid_by_apartment TEXT NOT NULL,
            receipt TEXT
        );
        INSERT INTO expenses(description, amount, date, category, paid_by_apartment)
            VALUES ('Lift service', '1400', '2025-01-10', 'maintenance', 'T1');
        INSERT INTO expenses(description, amount, date, category, paid_by_apartment)
            VALUES ('Stairs', '200', '2025-01-12', 'cleaning', 'G1');
        "#,
    )
    .unwrap();
    db::init_schema(&mut conn).unwrap();
    apartments::seed(&conn).unwrap();
    conn
}

#[test]
fn schema_upgrade_adds_split_columns() {
    let conn = old_db();
    let stored = load_stored_expenses(&conn).unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(StoredExpense::is_legacy));
    let paid: String = conn
        .query_row("SELECT paid_by FROM expenses WHERE id=1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(paid, "[]");
}

#[test]
fn backfill_writes_once() {
    let conn = old_db();
    let cfg = load_config(&conn).unwrap();

    let first = backfill_legacy(&conn, &cfg).unwrap();
    assert_eq!(first.scanned, 2);
    assert_eq!(first.upgraded, 2);

    let second = backfill_legacy(&conn, &cfg).unwrap();
    assert_eq!(second.upgraded, 0);

    let (owed, share): (String, String) = conn
        .query_row(
            "SELECT owed_by, per_apartment_share FROM expenses WHERE id=1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(owed, r#"["F1","F2","G1","S1","S2","T2"]"#);
    assert_eq!(share.parse::<Decimal>().unwrap(), Decimal::from(200));

    let (owed, share): (String, String) = conn
        .query_row(
            "SELECT owed_by, per_apartment_share FROM expenses WHERE id=2",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(owed, "[]");
    assert!(share.parse::<Decimal>().unwrap().is_zero());
}

#[test]
fn reading_balances_backfills_transparently() {
    let conn = old_db();
    let report = balances::current_report(&conn).unwrap();
    assert_eq!(report.balance_of(&ApartmentId::new("T1")), Decimal::from(1200));
    assert_eq!(report.balance_of(&ApartmentId::new("G1")), Decimal::from(-200));

    let cfg = load_config(&conn).unwrap();
    assert_eq!(backfill_legacy(&conn, &cfg).unwrap().upgraded, 0);
}

#[test]
fn doctor_flags_legacy_rows_until_migrated() {
    let conn = old_db();
    let issues = doctor::diagnose(&conn).unwrap();
    assert!(issues.iter().any(|r| r[0] == "legacy_expenses"));

    backfill_legacy(&conn, &EngineConfig::default()).unwrap();
    assert!(doctor::diagnose(&conn).unwrap().is_empty());
}

#[test]
fn doctor_reports_but_does_not_repair_inconsistent_rows() {
    let conn = old_db();
    backfill_legacy(&conn, &EngineConfig::default()).unwrap();
    conn.execute(
        "UPDATE expenses SET paid_by='[\"T1\"]' WHERE id=1",
        [],
    )
    .unwrap();

    let issues = doctor::diagnose(&conn).unwrap();
    assert!(issues.iter().any(|r| r[0] == "inconsistent_expense"));
    assert!(balances::current_report(&conn).is_err());

    let paid: String = conn
        .query_row("SELECT paid_by FROM expenses WHERE id=1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(paid, r#"["T1"]"#);
}
