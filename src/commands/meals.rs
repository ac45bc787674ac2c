// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;

use crate::api::Slice;
use crate::config;
use crate::errors::MessError;
use crate::ledger::{self, Actor};
use crate::models::{MealType, Member};
use crate::utils::{maybe_print_json, parse_date, parse_month, pretty_table};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("rm", sub)) => remove(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("count", sub)) => count(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn meal_types(arg: &str) -> Result<Vec<MealType>> {
    if arg.trim().eq_ignore_ascii_case("both") {
        Ok(vec![MealType::Lunch, MealType::Dinner])
    } else {
        Ok(vec![arg.parse::<MealType>()?])
    }
}

/// Members can only touch their own attendance.
fn target_member(conn: &Connection, actor: &Actor, name: &str) -> Result<Member> {
    let member = ledger::member_by_name(conn, name)?;
    if let Actor::Member(me) = actor {
        if me.id != member.id && !actor.is_privileged() {
            return Err(MessError::PermissionDenied(
                "members can only change their own meals".to_string(),
            )
            .into());
        }
    }
    Ok(member)
}

/// Marks `member` as eating each of `types` on `date`. Either every entry
/// is recorded or none is.
pub fn add_meals(
    conn: &Connection,
    member: &Member,
    date: NaiveDate,
    types: &[MealType],
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for t in types {
        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM meals WHERE member_id=?1 AND date=?2 AND meal_type=?3",
                params![member.id, date.to_string(), t.as_str()],
                |r| r.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(MessError::DuplicateMeal {
                member: member.name.clone(),
                date: date.to_string(),
                meal: t.as_str().to_string(),
            }
            .into());
        }
        tx.execute(
            "INSERT INTO meals(member_id, date, meal_type) VALUES (?1, ?2, ?3)",
            params![member.id, date.to_string(), t.as_str()],
        )?;
    }
    config::mark_stale(&tx, Slice::Meals)?;
    tx.commit()?;
    info!(member = %member.name, %date, count = types.len(), "meals recorded");
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let actor = ledger::actor_from(conn, sub)?;
    let member = target_member(conn, &actor, sub.get_one::<String>("member").unwrap())?;
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;
    let types = meal_types(sub.get_one::<String>("type").unwrap())?;
    add_meals(conn, &member, date, &types)?;
    println!(
        "Recorded {} for {} on {}",
        types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(" + "),
        member.name,
        date
    );
    Ok(())
}

fn remove(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let actor = ledger::actor_from(conn, sub)?;
    let member = target_member(conn, &actor, sub.get_one::<String>("member").unwrap())?;
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;
    let mut removed = 0;
    for t in meal_types(sub.get_one::<String>("type").unwrap())? {
        removed += conn.execute(
            "DELETE FROM meals WHERE member_id=?1 AND date=?2 AND meal_type=?3",
            params![member.id, date.to_string(), t.as_str()],
        )?;
    }
    if removed > 0 {
        config::mark_stale(conn, Slice::Meals)?;
    }
    println!("Removed {} meal(s) for {} on {}", removed, member.name, date);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct MealRow {
    pub date: String,
    pub member: String,
    pub lunch: bool,
    pub dinner: bool,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let only = match sub.get_one::<String>("member") {
        Some(n) => Some(ledger::member_by_name(conn, n)?.id),
        None => None,
    };
    let names: BTreeMap<i64, String> = ledger::load_members(conn)?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect();

    let mut grid: BTreeMap<(NaiveDate, String), (bool, bool)> = BTreeMap::new();
    for meal in ledger::load_meals(conn, Some(&month))? {
        if only.is_some_and(|id| id != meal.member_id) {
            continue;
        }
        let name = names
            .get(&meal.member_id)
            .cloned()
            .unwrap_or_else(|| format!("#{}", meal.member_id));
        let slot = grid.entry((meal.date, name)).or_default();
        match meal.meal_type {
            MealType::Lunch => slot.0 = true,
            MealType::Dinner => slot.1 = true,
        }
    }
    let data: Vec<MealRow> = grid
        .into_iter()
        .map(|((date, member), (lunch, dinner))| MealRow {
            date: date.to_string(),
            member,
            lunch,
            dinner,
        })
        .collect();

    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let mark = |b: bool| if b { "x".to_string() } else { String::new() };
        let rows = data
            .iter()
            .map(|r| vec![r.date.clone(), r.member.clone(), mark(r.lunch), mark(r.dinner)])
            .collect();
        println!(
            "{}",
            pretty_table(&["Date", "Member", "Lunch", "Dinner"], rows)
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct MealCount {
    pub member: String,
    pub lunch: u32,
    pub dinner: u32,
    pub total: u32,
}

pub fn monthly_counts(conn: &Connection, month: &str) -> Result<Vec<MealCount>> {
    let mut counts: BTreeMap<i64, (u32, u32)> = BTreeMap::new();
    for meal in ledger::load_meals(conn, Some(month))? {
        let c = counts.entry(meal.member_id).or_default();
        match meal.meal_type {
            MealType::Lunch => c.0 += 1,
            MealType::Dinner => c.1 += 1,
        }
    }
    Ok(ledger::load_members(conn)?
        .into_iter()
        .map(|m| {
            let (lunch, dinner) = counts.get(&m.id).copied().unwrap_or_default();
            MealCount {
                member: m.name,
                lunch,
                dinner,
                total: lunch + dinner,
            }
        })
        .collect())
}

fn count(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let data = monthly_counts(conn, &month)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .iter()
            .map(|c| {
                vec![
                    c.member.clone(),
                    c.lunch.to_string(),
                    c.dinner.to_string(),
                    c.total.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Member", "Lunch", "Dinner", "Total"], rows)
        );
    }
    Ok(())
}
