// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use crate::api::Slice;
use crate::config;
use crate::errors::MessError;
use crate::ledger::{self, Actor};
use crate::models::{GuestMealType, MealType};
use crate::utils::{fmt_amount, maybe_print_json, parse_date, parse_month, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => {
            let actor = ledger::actor_from(conn, sub)?;
            actor.require_privileged("delete guest meals")?;
            let id = *sub.get_one::<i64>("id").unwrap();
            let n = conn.execute("DELETE FROM guest_meals WHERE id=?1", params![id])?;
            if n == 0 {
                return Err(MessError::NotFound { kind: "Guest meal", id }.into());
            }
            config::mark_stale(conn, Slice::GuestMeals)?;
            println!("Removed guest meal #{}", id);
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let actor = ledger::actor_from(conn, sub)?;
    let host = ledger::member_by_name(conn, sub.get_one::<String>("host").unwrap())?;
    if let Actor::Member(me) = &actor {
        if me.id != host.id && !actor.is_privileged() {
            return Err(MessError::PermissionDenied(
                "members can only book guests for themselves".to_string(),
            )
            .into());
        }
    }
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;
    let kind = sub.get_one::<String>("type").unwrap().parse::<GuestMealType>()?;
    let time = sub.get_one::<String>("time").unwrap().parse::<MealType>()?;
    let quantity = *sub.get_one::<u32>("quantity").unwrap();
    let price = config::guest_price(conn, kind)?;

    conn.execute(
        "INSERT INTO guest_meals(date, host_member_id, guest_meal_type, meal_time, quantity,
         unit_price) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            date.to_string(),
            host.id,
            kind.as_str(),
            time.as_str(),
            quantity,
            price.to_string()
        ],
    )?;
    config::mark_stale(conn, Slice::GuestMeals)?;
    let total = price * Decimal::from(quantity);
    info!(host = %host.name, %date, kind = kind.as_str(), quantity, "guest meal recorded");
    println!(
        "Guest meal: {} x {} {} for {} on {} = {}",
        quantity,
        kind.as_str(),
        time.as_str(),
        host.name,
        date,
        fmt_amount(&total)
    );
    Ok(())
}

#[derive(Serialize)]
pub struct GuestRow {
    pub id: i64,
    pub date: String,
    pub host: String,
    pub kind: String,
    pub time: String,
    pub quantity: u32,
    pub cost: String,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let names: HashMap<i64, String> = ledger::load_members(conn)?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect();
    let data: Vec<GuestRow> = ledger::load_guest_meals(conn, Some(&month))?
        .into_iter()
        .map(|g| GuestRow {
            id: g.id,
            date: g.date.to_string(),
            host: names
                .get(&g.host_member_id)
                .cloned()
                .unwrap_or_else(|| format!("#{}", g.host_member_id)),
            kind: g.guest_meal_type.as_str().to_string(),
            time: g.meal_time.as_str().to_string(),
            quantity: g.quantity,
            cost: fmt_amount(&g.cost()),
        })
        .collect();
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .iter()
            .map(|g| {
                vec![
                    g.id.to_string(),
                    g.date.clone(),
                    g.host.clone(),
                    g.kind.clone(),
                    g.time.clone(),
                    g.quantity.to_string(),
                    g.cost.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["ID", "Date", "Host", "Type", "Time", "Qty", "Cost"], rows)
        );
    }
    Ok(())
}
