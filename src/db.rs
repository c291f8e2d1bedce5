// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.alphavelocity", "Aptsplit", "aptsplit"));

pub fn db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("aptsplit.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    open_at(&db_path()?)
}

/// Opens (creating if needed) the database file at `path`. Writers from other
/// processes are waited on for up to five seconds instead of failing at once.
pub fn open_at(path: &Path) -> Result<Connection> {
    let mut conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    conn.busy_timeout(Duration::from_secs(5))?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS apartments(
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- owed_by / per_apartment_share are NULL on rows written before splits existed
    CREATE TABLE IF NOT EXISTS expenses(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        description TEXT NOT NULL,
        amount TEXT NOT NULL,
        date TEXT NOT NULL,
        category TEXT NOT NULL,
        paid_by_apartment TEXT NOT NULL,
        owed_by TEXT,
        per_apartment_share TEXT,
        paid_by TEXT NOT NULL DEFAULT '[]',
        receipt TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(paid_by_apartment) REFERENCES apartments(id) ON DELETE RESTRICT
    );
    CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date);

    CREATE TABLE IF NOT EXISTS payments(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        payer TEXT NOT NULL,
        payee TEXT NOT NULL,
        amount TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending','approved','rejected')),
        month TEXT NOT NULL,
        receipt TEXT,
        approved_by TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(payer) REFERENCES apartments(id) ON DELETE RESTRICT,
        FOREIGN KEY(payee) REFERENCES apartments(id) ON DELETE RESTRICT
    );

    CREATE TABLE IF NOT EXISTS balance_sheets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        apartment TEXT NOT NULL,
        month TEXT NOT NULL,
        opening_balance TEXT NOT NULL,
        total_income TEXT NOT NULL,
        total_expenses TEXT NOT NULL,
        closing_balance TEXT NOT NULL,
        UNIQUE(apartment, month),
        FOREIGN KEY(apartment) REFERENCES apartments(id) ON DELETE RESTRICT
    );

    -- recipient + is_read for direct notifications, read_state map for broadcasts
    CREATE TABLE IF NOT EXISTS notifications(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        recipient TEXT,
        is_read INTEGER NOT NULL DEFAULT 0,
        read_state TEXT,
        from_apartment TEXT,
        amount TEXT,
        due_date TEXT,
        created_at TEXT NOT NULL,
        expires_at TEXT,
        CHECK((recipient IS NULL) <> (read_state IS NULL))
    );

    CREATE TABLE IF NOT EXISTS polls(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        question TEXT NOT NULL,
        options TEXT NOT NULL,
        votes TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    )?;
    ensure_expense_split_columns(conn)?;
    Ok(())
}

/// Adds split columns to `expenses` tables created by older releases.
fn ensure_expense_split_columns(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(expenses)")?;
    let cols: Vec<String> = stmt
        .query_map([], |r| r.get::<_, String>(1))?
        .collect::<rusqlite::Result<_>>()?;
    for (col, ddl) in [
        ("owed_by", "ALTER TABLE expenses ADD COLUMN owed_by TEXT"),
        (
            "per_apartment_share",
            "ALTER TABLE expenses ADD COLUMN per_apartment_share TEXT",
        ),
        (
            "paid_by",
            "ALTER TABLE expenses ADD COLUMN paid_by TEXT NOT NULL DEFAULT '[]'",
        ),
    ] {
        if !cols.iter().any(|c| c == col) {
            info!(column = col, "adding missing expenses column");
            conn.execute_batch(ddl)
                .with_context(|| format!("Failed to add expenses.{}", col))?;
        }
    }
    Ok(())
}
