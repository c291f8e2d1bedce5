// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use clap::ArgMatches;
use rusqlite::Connection;

use crate::engine::tracker::Actor;
use crate::models::Apartment;
use crate::store::require_apartment;

pub mod apartments;
pub mod balances;
pub mod doctor;
pub mod expenses;
pub mod exporter;
pub mod notifications;
pub mod payments;
pub mod polls;
pub mod requests;
pub mod settings;
pub mod sheets;

/// Routes a parsed top-level subcommand to its handler. `init` is handled by the binary.
pub fn dispatch(conn: &Connection, matches: &ArgMatches) -> Result<bool> {
    match matches.subcommand() {
        Some(("apartment", sub)) => apartments::handle(conn, sub)?,
        Some(("expense", sub)) => expenses::handle(conn, sub)?,
        Some(("balance", sub)) => balances::handle(conn, sub)?,
        Some(("request", sub)) => requests::handle(conn, sub)?,
        Some(("payment", sub)) => payments::handle(conn, sub)?,
        Some(("sheet", sub)) => sheets::handle(conn, sub)?,
        Some(("notify", sub)) => notifications::handle(conn, sub)?,
        Some(("poll", sub)) => polls::handle(conn, sub)?,
        Some(("migrate", _)) => doctor::migrate(conn)?,
        Some(("doctor", _)) => doctor::handle(conn)?,
        Some(("export", sub)) => exporter::handle(conn, sub)?,
        Some(("config", sub)) => settings::handle(conn, sub)?,
        _ => return Ok(false),
    }
    Ok(true)
}

/// Fetches a string argument clap has already marked as required.
pub(crate) fn required<'a>(m: &'a ArgMatches, name: &str) -> Result<&'a str> {
    m.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing --{}", name))
}

pub(crate) fn required_id(m: &ArgMatches) -> Result<i64> {
    m.get_one::<i64>("id")
        .copied()
        .ok_or_else(|| anyhow!("Missing --id"))
}

/// Resolves `--as <apt>` / `--admin` into the acting party.
pub(crate) fn actor(m: &ArgMatches, registry: &[Apartment]) -> Result<Actor> {
    if m.get_flag("admin") {
        return Ok(Actor::Admin);
    }
    match m.get_one::<String>("as") {
        Some(code) => Ok(Actor::Apartment(require_apartment(registry, code)?)),
        None => Err(anyhow!("Say who is acting with --as <APARTMENT> or --admin")),
    }
}
