// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

use super::{required, required_id};
use crate::engine::polls::Poll;
use crate::models::ApartmentId;
use crate::store::{
    get_poll, insert_poll, list_poll_ids, load_apartments, require_apartment, update_poll,
};
use crate::utils::{maybe_print_json, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("create", sub)) => {
            let labels: Vec<String> = sub
                .get_many::<String>("option")
                .ok_or_else(|| anyhow!("Missing --option"))?
                .cloned()
                .collect();
            let poll = create(conn, required(sub, "question")?, &labels)?;
            println!(
                "Poll {} opened for {} apartments",
                poll.id,
                poll.votes.len()
            );
        }
        Some(("vote", sub)) => {
            let registry = load_apartments(conn)?;
            let apt = require_apartment(&registry, required(sub, "apartment")?)?;
            let id = required_id(sub)?;
            match vote(conn, id, &apt, required(sub, "option")?)? {
                Some(prev) => println!("{} changed its vote on poll {} (was option {})", apt, id, prev),
                None => println!("{} voted on poll {}", apt, id),
            }
        }
        Some(("show", sub)) => {
            let poll = get_poll(conn, required_id(sub)?)?;
            let tally = poll.tally();
            let payload = json!({ "poll": &poll, "tally": &tally });
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &payload)? {
                println!(
                    "Poll {}: {} [{}]",
                    poll.id,
                    poll.question,
                    if poll.is_active { "open" } else { "closed" }
                );
                let rows = tally
                    .iter()
                    .map(|t| vec![t.option.id.clone(), t.option.label.clone(), t.votes.to_string()])
                    .collect();
                println!("{}", pretty_table(&["#", "Option", "Votes"], rows));
                let waiting: Vec<String> = poll
                    .votes
                    .iter()
                    .filter(|(_, v)| v.is_none())
                    .map(|(a, _)| a.to_string())
                    .collect();
                println!(
                    "{} of {} apartments voted{}",
                    poll.voter_count(),
                    poll.votes.len(),
                    if waiting.is_empty() {
                        String::new()
                    } else {
                        format!("; waiting on {}", waiting.join(", "))
                    }
                );
            }
        }
        Some(("close", sub)) => {
            let id = required_id(sub)?;
            if update_poll(conn, id, |poll| Ok(poll.close()))? {
                info!(poll = id, "poll closed");
                println!("Poll {} closed", id);
            } else {
                println!("Poll {} was already closed", id);
            }
        }
        Some(("list", _)) => {
            let mut rows = Vec::new();
            for id in list_poll_ids(conn)? {
                let poll = get_poll(conn, id)?;
                rows.push(vec![
                    poll.id.to_string(),
                    poll.question.clone(),
                    if poll.is_active { "open" } else { "closed" }.to_string(),
                    format!("{}/{}", poll.voter_count(), poll.votes.len()),
                ]);
            }
            println!("{}", pretty_table(&["ID", "Question", "State", "Voted"], rows));
        }
        _ => {}
    }
    Ok(())
}

/// Opens a poll with every registered apartment as an eligible voter.
pub fn create(conn: &Connection, question: &str, labels: &[String]) -> Result<Poll> {
    let registry = load_apartments(conn)?;
    let mut poll = Poll::new(0, question, labels, &registry)?;
    poll.id = insert_poll(conn, &poll)?;
    info!(poll = poll.id, options = poll.options.len(), "poll created");
    Ok(poll)
}

/// Records `apartment`'s choice, returning the option it replaced.
pub fn vote(
    conn: &Connection,
    id: i64,
    apartment: &ApartmentId,
    choice: &str,
) -> Result<Option<String>> {
    update_poll(conn, id, |poll| Ok(poll.vote(apartment, choice)?))
}
