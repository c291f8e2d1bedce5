// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, bail};
use rusqlite::Connection;
use tracing::info;

use super::required;
use crate::models::Apartment;
use crate::store::{insert_apartment, load_apartments};
use crate::utils::{maybe_print_json, pretty_table};

/// Default registry for a three-storey building with a ground-floor unit.
pub const DEFAULT_REGISTRY: &[(&str, &str)] = &[
    ("G1", "Ground floor"),
    ("F1", "First floor, left"),
    ("F2", "First floor, right"),
    ("S1", "Second floor, left"),
    ("S2", "Second floor, right"),
    ("T1", "Third floor, left"),
    ("T2", "Third floor, right"),
];

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let apartment = Apartment::new(required(sub, "id")?, required(sub, "name")?.trim());
            if apartment.id.as_str().is_empty() {
                bail!("Apartment id must not be empty");
            }
            insert_apartment(conn, &apartment)?;
            println!("Added apartment {} ({})", apartment.id, apartment.name);
        }
        Some(("list", sub)) => {
            let data = load_apartments(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .iter()
                    .map(|a| vec![a.id.to_string(), a.name.clone()])
                    .collect();
                println!("{}", pretty_table(&["Apartment", "Name"], rows));
            }
        }
        Some(("seed", _)) => {
            let added = seed(conn)?;
            if added == 0 {
                println!("Registry already populated; nothing seeded");
            } else {
                println!("Seeded {} apartments", added);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Inserts the default registry when no apartment exists yet. Returns how many were added.
pub fn seed(conn: &Connection) -> Result<usize> {
    if !load_apartments(conn)?.is_empty() {
        return Ok(0);
    }
    let tx = conn.unchecked_transaction()?;
    for (id, name) in DEFAULT_REGISTRY {
        insert_apartment(&tx, &Apartment::new(id, *name))?;
    }
    tx.commit()?;
    info!(count = DEFAULT_REGISTRY.len(), "apartment registry seeded");
    Ok(DEFAULT_REGISTRY.len())
}
