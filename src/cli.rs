// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print as JSON lines"),
    )
}

fn actor_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("as")
            .long("as")
            .value_name("APARTMENT")
            .help("Apartment performing the action"),
    )
    .arg(
        Arg::new("admin")
            .long("admin")
            .action(ArgAction::SetTrue)
            .conflicts_with("as")
            .help("Act as building administrator"),
    )
}

fn req(name: &'static str) -> Arg {
    Arg::new(name).long(name).required(true)
}

fn opt(name: &'static str) -> Arg {
    Arg::new(name).long(name)
}

pub fn build_cli() -> Command {
    Command::new("aptsplit")
        .about("Shared expenses, who-owes-whom balances, and building notices for apartments")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("apartment")
                .about("Manage the apartment registry")
                .subcommand(
                    Command::new("add")
                        .arg(req("id").help("Short code, e.g. G1"))
                        .arg(req("name")),
                )
                .subcommand(json_flags(Command::new("list")))
                .subcommand(
                    Command::new("seed").about("Insert the default G1..T2 registry if empty"),
                ),
        )
        .subcommand(
            Command::new("expense")
                .about("Record and settle shared expenses")
                .subcommand(
                    Command::new("add")
                        .arg(req("description"))
                        .arg(req("amount"))
                        .arg(req("date").help("YYYY-MM-DD"))
                        .arg(req("category"))
                        .arg(req("payer").help("Apartment that paid"))
                        .arg(opt("receipt").help("Receipt reference")),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .arg(opt("apartment").help("Only expenses involving this apartment"))
                        .arg(opt("month").help("YYYY-MM")),
                ))
                .subcommand(actor_args(
                    Command::new("mark-paid")
                        .arg(req("id").value_parser(value_parser!(i64)))
                        .arg(req("apartment")),
                ))
                .subcommand(actor_args(
                    Command::new("mark-unpaid")
                        .arg(req("id").value_parser(value_parser!(i64)))
                        .arg(req("apartment")),
                )),
        )
        .subcommand(
            Command::new("balance").about("Who owes whom").subcommand(json_flags(
                Command::new("show").arg(opt("apartment").help("Show one apartment's breakdown")),
            )),
        )
        .subcommand(
            Command::new("request")
                .about("Ad-hoc payment requests split between apartments")
                .subcommand(json_flags(
                    Command::new("preview")
                        .arg(req("amount"))
                        .arg(req("payer"))
                        .arg(opt("category")),
                ))
                .subcommand(
                    Command::new("send")
                        .arg(req("amount"))
                        .arg(req("payer"))
                        .arg(req("description"))
                        .arg(opt("category"))
                        .arg(opt("due").help("Due date YYYY-MM-DD")),
                ),
        )
        .subcommand(
            Command::new("payment")
                .about("Direct payments between apartments")
                .subcommand(
                    Command::new("add")
                        .arg(req("payer"))
                        .arg(req("payee"))
                        .arg(req("amount"))
                        .arg(req("month").help("YYYY-MM"))
                        .arg(opt("receipt")),
                )
                .subcommand(actor_args(
                    Command::new("approve").arg(req("id").value_parser(value_parser!(i64))),
                ))
                .subcommand(actor_args(
                    Command::new("reject").arg(req("id").value_parser(value_parser!(i64))),
                ))
                .subcommand(json_flags(
                    Command::new("list").arg(opt("status").help("pending|approved|rejected")),
                )),
        )
        .subcommand(
            Command::new("sheet")
                .about("Monthly balance sheets")
                .subcommand(Command::new("close").arg(req("month").help("YYYY-MM")))
                .subcommand(json_flags(Command::new("list").arg(opt("month")))),
        )
        .subcommand(
            Command::new("notify")
                .about("Building notifications")
                .subcommand(
                    Command::new("broadcast")
                        .arg(req("title"))
                        .arg(req("body"))
                        .arg(opt("expires").help("Expiry date YYYY-MM-DD")),
                )
                .subcommand(json_flags(
                    Command::new("list").arg(req("apartment")).arg(
                        Arg::new("all")
                            .long("all")
                            .action(ArgAction::SetTrue)
                            .help("Include read and expired notifications"),
                    ),
                ))
                .subcommand(
                    Command::new("read")
                        .arg(req("id").value_parser(value_parser!(i64)))
                        .arg(req("apartment")),
                ),
        )
        .subcommand(
            Command::new("poll")
                .about("One vote per apartment polls")
                .subcommand(
                    Command::new("create").arg(req("question")).arg(
                        Arg::new("option")
                            .long("option")
                            .required(true)
                            .action(ArgAction::Append)
                            .help("Repeat for each option"),
                    ),
                )
                .subcommand(
                    Command::new("vote")
                        .arg(req("id").value_parser(value_parser!(i64)))
                        .arg(req("apartment"))
                        .arg(req("option").help("Option number or label")),
                )
                .subcommand(json_flags(
                    Command::new("show").arg(req("id").value_parser(value_parser!(i64))),
                ))
                .subcommand(Command::new("close").arg(req("id").value_parser(value_parser!(i64))))
                .subcommand(Command::new("list")),
        )
        .subcommand(Command::new("migrate").about("Backfill split fields on legacy expenses"))
        .subcommand(Command::new("doctor").about("Report inconsistent records"))
        .subcommand(
            Command::new("export")
                .about("Export data")
                .subcommand(
                    Command::new("expenses")
                        .arg(req("format").help("csv|json"))
                        .arg(req("out")),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Engine settings")
                .subcommand(json_flags(Command::new("show")))
                .subcommand(
                    Command::new("set")
                        .arg(req("key").help("non_split_categories|request_due_days"))
                        .arg(req("value")),
                ),
        )
}
