// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use aptsplit::{cli, commands, db, utils};

fn main() -> Result<()> {
    utils::init_tracing();
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let conn = db::open_or_init()?;

    if let Some(("init", _)) = matches.subcommand() {
        println!("Database initialized at {}", db::db_path()?.display());
        return Ok(());
    }
    if !commands::dispatch(&conn, &matches)? {
        cli::build_cli().print_help()?;
        println!();
    }
    Ok(())
}
