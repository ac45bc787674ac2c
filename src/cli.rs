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
            .help("Print pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print one JSON object per line"),
    )
}

fn month_arg(required: bool) -> Arg {
    Arg::new("month")
        .long("month")
        .value_name("YYYY-MM")
        .required(required)
}

fn id_arg() -> Arg {
    Arg::new("id")
        .long("id")
        .required(true)
        .value_parser(value_parser!(i64))
}

pub fn build_cli() -> Command {
    Command::new("messbook")
        .about("Meals, expenses, market duty and monthly billing for a shared mess")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("as")
                .long("as")
                .global(true)
                .value_name("MEMBER")
                .help("Act as this member instead of the admin"),
        )
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("member")
                .about("Manage members")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("login").long("login").required(true))
                        .arg(Arg::new("dob").long("dob").value_name("YYYY-MM-DD"))
                        .arg(Arg::new("mobile").long("mobile"))
                        .arg(
                            Arg::new("role")
                                .long("role")
                                .value_parser(["member", "manager"])
                                .default_value("member"),
                        )
                        .arg(Arg::new("deposit").long("deposit").default_value("0")),
                )
                .subcommand(json_flags(Command::new("list")))
                .subcommand(Command::new("rm").arg(Arg::new("name").long("name").required(true)))
                .subcommand(
                    Command::new("deposit")
                        .about("Record a deposit received from a member")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("date").long("date").value_name("YYYY-MM-DD")),
                )
                .subcommand(
                    Command::new("adjust")
                        .about("Adjust a member's deposit balance without a ledger entry")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(
                            Arg::new("amount")
                                .long("amount")
                                .required(true)
                                .allow_hyphen_values(true),
                        ),
                )
                .subcommand(
                    Command::new("role")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(
                            Arg::new("role")
                                .long("role")
                                .required(true)
                                .value_parser(["member", "manager"]),
                        ),
                ),
        )
        .subcommand(
            Command::new("expense")
                .about("Record and approve expenses")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("date").long("date").required(true))
                        .arg(Arg::new("category").long("category").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(
                            Arg::new("paid_by")
                                .long("paid-by")
                                .value_name("MEMBER")
                                .help("Member who paid (admin only; defaults to the actor)"),
                        )
                        .arg(Arg::new("description").long("description")),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .arg(month_arg(false))
                        .arg(Arg::new("category").long("category"))
                        .arg(
                            Arg::new("status")
                                .long("status")
                                .value_parser(["pending", "approved", "rejected"]),
                        ),
                ))
                .subcommand(Command::new("approve").arg(id_arg()))
                .subcommand(Command::new("reject").arg(id_arg()))
                .subcommand(Command::new("rm").arg(id_arg())),
        )
        .subcommand(
            Command::new("meal")
                .about("Track meal attendance")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("member").long("member").required(true))
                        .arg(Arg::new("date").long("date").required(true))
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .value_parser(["lunch", "dinner", "both"])
                                .default_value("both"),
                        ),
                )
                .subcommand(
                    Command::new("rm")
                        .arg(Arg::new("member").long("member").required(true))
                        .arg(Arg::new("date").long("date").required(true))
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .value_parser(["lunch", "dinner", "both"])
                                .default_value("both"),
                        ),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .arg(month_arg(true))
                        .arg(Arg::new("member").long("member")),
                ))
                .subcommand(json_flags(Command::new("count").arg(month_arg(true)))),
        )
        .subcommand(
            Command::new("guest")
                .about("Guest meals billed to a host member")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("date").long("date").required(true))
                        .arg(Arg::new("host").long("host").required(true))
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .required(true)
                                .value_parser(["fish", "egg", "veg", "meat"]),
                        )
                        .arg(
                            Arg::new("time")
                                .long("time")
                                .value_parser(["lunch", "dinner"])
                                .default_value("lunch"),
                        )
                        .arg(
                            Arg::new("quantity")
                                .long("quantity")
                                .value_parser(value_parser!(u32).range(1..))
                                .default_value("1"),
                        ),
                )
                .subcommand(json_flags(Command::new("list").arg(month_arg(true))))
                .subcommand(Command::new("rm").arg(id_arg())),
        )
        .subcommand(
            Command::new("duty")
                .about("Market duty schedule")
                .subcommand(
                    Command::new("request")
                        .arg(Arg::new("date").long("date").required(true))
                        .arg(
                            Arg::new("member")
                                .long("member")
                                .help("Member to request for (admin/manager only)"),
                        ),
                )
                .subcommand(
                    Command::new("assign")
                        .about("Assign and approve a day directly")
                        .arg(Arg::new("date").long("date").required(true))
                        .arg(Arg::new("member").long("member").required(true)),
                )
                .subcommand(Command::new("approve").arg(id_arg()))
                .subcommand(Command::new("reject").arg(id_arg()))
                .subcommand(json_flags(Command::new("list").arg(month_arg(true))))
                .subcommand(Command::new("calendar").arg(month_arg(true))),
        )
        .subcommand(
            Command::new("summary")
                .about("Monthly reconciliation")
                .subcommand(json_flags(Command::new("show").arg(month_arg(true))))
                .subcommand(Command::new("close").arg(month_arg(true))),
        )
        .subcommand(
            Command::new("payment")
                .about("Payment submissions and status")
                .subcommand(
                    Command::new("submit")
                        .arg(month_arg(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("member").long("member")),
                )
                .subcommand(json_flags(Command::new("status").arg(month_arg(true)))),
        )
        .subcommand(
            Command::new("invoice")
                .about("Per-member monthly invoices")
                .arg(month_arg(true))
                .arg(Arg::new("member").long("member"))
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_parser(["text", "csv", "json"])
                        .default_value("text"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .help("Write to this file instead of stdout (required for csv)"),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export ledger data")
                .subcommand(
                    Command::new("expenses")
                        .arg(month_arg(false))
                        .arg(Arg::new("format").long("format").default_value("csv"))
                        .arg(Arg::new("out").long("out").required(true)),
                )
                .subcommand(
                    Command::new("meals")
                        .arg(month_arg(false))
                        .arg(Arg::new("format").long("format").default_value("csv"))
                        .arg(Arg::new("out").long("out").required(true)),
                ),
        )
        .subcommand(
            Command::new("notify")
                .about("Member notifications")
                .subcommand(
                    Command::new("list")
                        .arg(Arg::new("member").long("member"))
                        .arg(Arg::new("unread").long("unread").action(ArgAction::SetTrue)),
                )
                .subcommand(
                    Command::new("read")
                        .arg(Arg::new("member").long("member").required(true)),
                ),
        )
        .subcommand(
            Command::new("settings")
                .about("Billing and connection settings")
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("key").long("key").required(true))
                        .arg(Arg::new("value").long("value").required(true)),
                )
                .subcommand(Command::new("list")),
        )
        .subcommand(
            Command::new("remote")
                .about("Sync with the mess backend API")
                .subcommand(
                    Command::new("login")
                        .arg(Arg::new("username").long("username").required(true))
                        .arg(Arg::new("password").long("password").required(true)),
                )
                .subcommand(
                    Command::new("pull")
                        .arg(
                            Arg::new("only")
                                .long("only")
                                .action(ArgAction::Append)
                                .value_delimiter(',')
                                .value_parser([
                                    "members",
                                    "expenses",
                                    "meals",
                                    "guest-meals",
                                    "market",
                                ])
                                .help("Comma-separated slices to refresh (default: all)"),
                        )
                        .arg(
                            Arg::new("stale")
                                .long("stale")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("only")
                                .help("Refresh only slices changed locally since the last pull"),
                        ),
                ),
        )
        .subcommand(
            Command::new("doctor")
                .about("Check the ledger for problems")
                .arg(month_arg(false)),
        )
}
