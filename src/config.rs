// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::engine::split::SplitPolicy;

pub const KEY_NON_SPLIT: &str = "non_split_categories";
pub const KEY_DUE_DAYS: &str = "request_due_days";

pub const DEFAULT_NON_SPLIT: &[&str] = &["cleaning"];
pub const DEFAULT_DUE_DAYS: i64 = 7;
/// Ten years; longer offsets are almost certainly typos.
pub const MAX_DUE_DAYS: i64 = 3650;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    pub non_split_categories: Vec<String>,
    pub request_due_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            non_split_categories: DEFAULT_NON_SPLIT.iter().map(|s| s.to_string()).collect(),
            request_due_days: DEFAULT_DUE_DAYS,
        }
    }
}

impl EngineConfig {
    pub fn split_policy(&self) -> SplitPolicy {
        SplitPolicy::new(self.non_split_categories.iter())
    }
}

fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key=?1",
            params![key],
            |r| r.get(0),
        )
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    match key {
        KEY_NON_SPLIT => {}
        KEY_DUE_DAYS => {
            let days = value
                .trim()
                .parse::<i64>()
                .with_context(|| format!("Invalid day count '{}'", value))?;
            if days < 0 {
                return Err(anyhow!("{} must not be negative", KEY_DUE_DAYS));
            }
            if days > MAX_DUE_DAYS {
                return Err(anyhow!("{} must be at most {}", KEY_DUE_DAYS, MAX_DUE_DAYS));
            }
        }
        other => return Err(anyhow!("Unknown setting '{}'", other)),
    }
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value.trim()],
    )?;
    Ok(())
}

/// Reads engine settings, falling back to defaults for anything unset.
pub fn load_config(conn: &Connection) -> Result<EngineConfig> {
    let mut cfg = EngineConfig::default();
    if let Some(raw) = get_setting(conn, KEY_NON_SPLIT)? {
        cfg.non_split_categories = raw
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(raw) = get_setting(conn, KEY_DUE_DAYS)? {
        cfg.request_due_days = raw
            .trim()
            .parse::<i64>()
            .with_context(|| format!("Invalid {} setting '{}'", KEY_DUE_DAYS, raw))?;
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE settings(key TEXT PRIMARY KEY, value TEXT NOT NULL);")
            .unwrap();
        conn
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = load_config(&conn()).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.request_due_days, 7);
    }

    #[test]
    fn non_split_list_is_normalized() {
        let conn = conn();
        set_setting(&conn, KEY_NON_SPLIT, " Cleaning , Gardening,,").unwrap();
        let cfg = load_config(&conn).unwrap();
        assert_eq!(cfg.non_split_categories, vec!["cleaning", "gardening"]);
    }

    #[test]
    fn rejects_unknown_and_bad_values() {
        let conn = conn();
        assert!(set_setting(&conn, "colour", "blue").is_err());
        assert!(set_setting(&conn, KEY_DUE_DAYS, "soon").is_err());
        assert!(set_setting(&conn, KEY_DUE_DAYS, "-1").is_err());
        assert!(set_setting(&conn, KEY_DUE_DAYS, "3651").is_err());
        assert!(set_setting(&conn, KEY_DUE_DAYS, &i64::MAX.to_string()).is_err());
        set_setting(&conn, KEY_DUE_DAYS, " 14 ").unwrap();
        assert_eq!(load_config(&conn).unwrap().request_due_days, 14);
    }
}
