// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::api::Slice;
use crate::commands::expenses::{NewExpense, record_expense};
use crate::config;
use crate::ledger::{self, Actor};
use crate::models::{ExpenseCategory, Payer, Role};
use crate::utils::{
    fmt_amount, maybe_print_json, parse_date, parse_decimal, parse_mobile, pretty_table,
};
use anyhow::{Context, Result, anyhow};
use chrono::Local;
use rusqlite::{Connection, params};
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let actor = ledger::actor_from(conn, m)?;
    match m.subcommand() {
        Some(("add", sub)) => add(conn, &actor, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => {
            actor.require_admin("remove members")?;
            let member = ledger::member_by_name(conn, sub.get_one::<String>("name").unwrap())?;
            conn.execute("DELETE FROM members WHERE id=?1", params![member.id])?;
            // their meals, guests and duties cascade with them
            for slice in [Slice::Members, Slice::Meals, Slice::GuestMeals, Slice::Market] {
                config::mark_stale(conn, slice)?;
            }
            info!(member = %member.name, "member removed");
            println!("Removed member '{}'", member.name);
        }
        Some(("deposit", sub)) => deposit(conn, &actor, sub)?,
        Some(("adjust", sub)) => {
            actor.require_admin("adjust deposits")?;
            let member = ledger::member_by_name(conn, sub.get_one::<String>("name").unwrap())?;
            let delta = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let updated = ledger::adjust_deposit(conn, member.id, delta)?;
            println!(
                "Adjusted {} by {}; deposit now {}",
                member.name,
                delta,
                fmt_amount(&updated)
            );
        }
        Some(("role", sub)) => {
            actor.require_admin("change roles")?;
            let member = ledger::member_by_name(conn, sub.get_one::<String>("name").unwrap())?;
            let role = sub.get_one::<String>("role").unwrap().parse::<Role>()?;
            conn.execute(
                "UPDATE members SET role=?1 WHERE id=?2",
                params![role.as_str(), member.id],
            )?;
            config::mark_stale(conn, Slice::Members)?;
            println!("{} is now a {}", member.name, role.as_str());
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, actor: &Actor, sub: &clap::ArgMatches) -> Result<()> {
    actor.require_admin("add members")?;
    let name = sub.get_one::<String>("name").unwrap().trim();
    let login = sub.get_one::<String>("login").unwrap().trim();
    if name.is_empty() || login.is_empty() {
        return Err(anyhow!("Member name and login cannot be empty"));
    }
    let dob = match sub.get_one::<String>("dob") {
        Some(d) => Some(parse_date(d)?),
        None => None,
    };
    let mobile = match sub.get_one::<String>("mobile") {
        Some(s) => Some(parse_mobile(s)?),
        None => None,
    };
    let role = sub.get_one::<String>("role").unwrap().parse::<Role>()?;
    let deposit = parse_decimal(sub.get_one::<String>("deposit").unwrap())?;

    conn.execute(
        "INSERT INTO members(name, login, deposit, dob, mobile, role) VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            name,
            login,
            deposit.to_string(),
            dob.map(|d| d.to_string()),
            mobile,
            role.as_str()
        ],
    )
    .with_context(|| {
        format!("Could not add member '{}' (name and login must be unique)", name)
    })?;
    config::mark_stale(conn, Slice::Members)?;
    info!(member = name, role = role.as_str(), "member added");
    println!("Added member '{}' ({})", name, role.as_str());
    Ok(())
}

fn deposit(conn: &Connection, actor: &Actor, sub: &clap::ArgMatches) -> Result<()> {
    let member = ledger::member_by_name(conn, sub.get_one::<String>("name").unwrap())?;
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let date = match sub.get_one::<String>("date") {
        Some(d) => parse_date(d)?,
        None => Local::now().date_naive(),
    };
    let (id, status) = record_expense(
        conn,
        actor,
        NewExpense {
            date,
            category: ExpenseCategory::Deposit,
            amount,
            paid_by: Some(Payer::Member(member.id)),
            description: "deposit".to_string(),
        },
    )?;
    println!(
        "Deposit #{} of {} from {} recorded as {}",
        id,
        fmt_amount(&amount),
        member.name,
        status.as_str()
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let members = ledger::load_members(conn)?;
    if !maybe_print_json(json_flag, jsonl_flag, &members)? {
        let rows: Vec<Vec<String>> = members
            .into_iter()
            .map(|m| {
                vec![
                    m.name,
                    m.login,
                    m.role.as_str().to_string(),
                    fmt_amount(&m.deposit),
                    m.mobile.unwrap_or_default(),
                    m.dob.map(|d| d.to_string()).unwrap_or_default(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Name", "Login", "Role", "Deposit", "Mobile", "DOB"], rows)
        );
    }
    Ok(())
}
