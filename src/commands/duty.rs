// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Market duty: members claim shopping days, the admin or a manager decides.

use std::collections::HashMap;

use crate::api::Slice;
use crate::config;
use crate::errors::MessError;
use crate::ledger::{self, Actor};
use crate::models::{DutyStatus, Member};
use crate::utils::{
    maybe_print_json, month_end, month_of, month_start, parse_date, parse_month, pretty_table,
};
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::Serialize;
use tracing::{info, warn};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("request", sub)) => {
            let actor = ledger::actor_from(conn, sub)?;
            let member = match (sub.get_one::<String>("member"), &actor) {
                (Some(name), _) => ledger::member_by_name(conn, name)?,
                (None, Actor::Member(me)) => me.clone(),
                (None, Actor::Admin) => {
                    return Err(anyhow::anyhow!("--member is required when acting as admin"));
                }
            };
            let date = parse_date(sub.get_one::<String>("date").unwrap())?;
            let id = request(conn, &actor, &member, date)?;
            println!("Requested market duty #{} for {} on {}", id, member.name, date);
        }
        Some(("assign", sub)) => {
            let actor = ledger::actor_from(conn, sub)?;
            let member = ledger::member_by_name(conn, sub.get_one::<String>("member").unwrap())?;
            let date = parse_date(sub.get_one::<String>("date").unwrap())?;
            let id = assign(conn, &actor, &member, date)?;
            println!("Assigned market duty #{} to {} on {}", id, member.name, date);
        }
        Some(("approve", sub)) => {
            let actor = ledger::actor_from(conn, sub)?;
            let id = *sub.get_one::<i64>("id").unwrap();
            decide(conn, &actor, id, DutyStatus::Approved)?;
            println!("Market duty #{} approved", id);
        }
        Some(("reject", sub)) => {
            let actor = ledger::actor_from(conn, sub)?;
            let id = *sub.get_one::<i64>("id").unwrap();
            decide(conn, &actor, id, DutyStatus::Rejected)?;
            println!("Market duty #{} rejected", id);
        }
        Some(("list", sub)) => list(conn, sub)?,
        Some(("calendar", sub)) => calendar(conn, sub)?,
        _ => {}
    }
    Ok(())
}

/// Pending and approved claims a member holds in `month`.
pub fn live_requests(conn: &Connection, member_id: i64, month: &str) -> Result<u32> {
    let n: u32 = conn.query_row(
        "SELECT COUNT(*) FROM market_duties
         WHERE member_id=?1 AND substr(date,1,7)=?2 AND status IN ('pending','approved')",
        params![member_id, month],
        |r| r.get(0),
    )?;
    Ok(n)
}

fn ensure_date_free(conn: &Connection, date: NaiveDate) -> Result<()> {
    let taken: Option<i64> = conn
        .query_row(
            "SELECT id FROM market_duties WHERE date=?1 AND status IN ('pending','approved')",
            params![date.to_string()],
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(MessError::DutyDateTaken {
            date: date.to_string(),
        }
        .into());
    }
    Ok(())
}

fn insert(conn: &Connection, member_id: i64, date: NaiveDate, status: DutyStatus) -> Result<i64> {
    match conn.execute(
        "INSERT INTO market_duties(date, member_id, status) VALUES (?1, ?2, ?3)",
        params![date.to_string(), member_id, status.as_str()],
    ) {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            config::mark_stale(conn, Slice::Market)?;
            Ok(id)
        }
        // the partial unique index catches a claim that slipped in between check and insert
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(MessError::DutyDateTaken {
                date: date.to_string(),
            }
            .into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Claims `date` for `member`. The day must be free and the member must be
/// under the monthly request quota.
pub fn request(conn: &Connection, actor: &Actor, member: &Member, date: NaiveDate) -> Result<i64> {
    if let Actor::Member(me) = actor {
        if me.id != member.id && !actor.is_privileged() {
            return Err(MessError::PermissionDenied(
                "members can only request duty for themselves".to_string(),
            )
            .into());
        }
    }
    ensure_date_free(conn, date)?;
    let month = month_of(date);
    let quota = config::duty_quota(conn)?;
    let used = live_requests(conn, member.id, &month)?;
    if used >= quota {
        warn!(member = %member.name, %month, used, quota, "market duty quota reached");
        return Err(MessError::DutyQuotaExceeded {
            member: member.name.clone(),
            month,
            quota,
        }
        .into());
    }
    let id = insert(conn, member.id, date, DutyStatus::Pending)?;
    info!(id, member = %member.name, %date, "market duty requested");
    Ok(id)
}

/// Direct assignment by the admin or a manager; approved immediately and
/// not counted against the quota check.
pub fn assign(conn: &Connection, actor: &Actor, member: &Member, date: NaiveDate) -> Result<i64> {
    actor.require_privileged("assign market duty")?;
    ensure_date_free(conn, date)?;
    let id = insert(conn, member.id, date, DutyStatus::Approved)?;
    ledger::notify(
        conn,
        member.id,
        &format!("You have been assigned market duty on {}", date),
    )?;
    info!(id, member = %member.name, %date, "market duty assigned");
    Ok(id)
}

pub fn decide(conn: &Connection, actor: &Actor, id: i64, decision: DutyStatus) -> Result<()> {
    actor.require_privileged("approve or reject market duty")?;
    let row: Option<(String, i64, String)> = conn
        .query_row(
            "SELECT date, member_id, status FROM market_duties WHERE id=?1",
            params![id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let (date, member_id, status) = row.ok_or(MessError::NotFound {
        kind: "Market duty",
        id,
    })?;
    if status.parse::<DutyStatus>()? != DutyStatus::Pending {
        return Err(MessError::AlreadyDecided {
            kind: "Market duty",
            id,
            status,
        }
        .into());
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE market_duties SET status=?1 WHERE id=?2",
        params![decision.as_str(), id],
    )?;
    ledger::notify(
        &tx,
        member_id,
        &format!("Your market duty request for {} was {}", date, decision.as_str()),
    )?;
    config::mark_stale(&tx, Slice::Market)?;
    tx.commit()?;
    info!(id, status = decision.as_str(), by = %actor.label(), "market duty decided");
    Ok(())
}

#[derive(Serialize)]
pub struct DutyRow {
    pub id: i64,
    pub date: String,
    pub member: String,
    pub status: String,
}

fn rows_for(conn: &Connection, month: &str) -> Result<Vec<DutyRow>> {
    let names: HashMap<i64, String> = ledger::load_members(conn)?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect();
    Ok(ledger::load_duties(conn, Some(month))?
        .into_iter()
        .map(|d| DutyRow {
            id: d.id,
            date: d.date.to_string(),
            member: names
                .get(&d.member_id)
                .cloned()
                .unwrap_or_else(|| format!("#{}", d.member_id)),
            status: d.status.as_str().to_string(),
        })
        .collect())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let data = rows_for(conn, &month)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .iter()
            .map(|d| vec![d.id.to_string(), d.date.clone(), d.member.clone(), d.status.clone()])
            .collect();
        println!("{}", pretty_table(&["ID", "Date", "Member", "Status"], rows));
    }
    Ok(())
}

/// Monday-first weeks of `month`; each cell holds the day number and any
/// live claim for that day.
pub fn calendar_grid(conn: &Connection, month: &str) -> Result<Vec<Vec<String>>> {
    let first = month_start(month)?;
    let last = month_end(month)?;
    let mut by_day: HashMap<u32, String> = HashMap::new();
    for d in rows_for(conn, month)? {
        if d.status == DutyStatus::Rejected.as_str() {
            continue;
        }
        if let Ok(date) = NaiveDate::parse_from_str(&d.date, "%Y-%m-%d") {
            by_day.insert(date.day(), format!("{} ({})", d.member, d.status));
        }
    }

    let mut weeks = Vec::new();
    let mut week = vec![String::new(); first.weekday().num_days_from_monday() as usize];
    for day in first.day()..=last.day() {
        let cell = match by_day.get(&day) {
            Some(who) => format!("{}\n{}", day, who),
            None => day.to_string(),
        };
        week.push(cell);
        if week.len() == 7 {
            weeks.push(std::mem::take(&mut week));
        }
    }
    if !week.is_empty() {
        week.resize(7, String::new());
        weeks.push(week);
    }
    Ok(weeks)
}

fn calendar(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let weeks = calendar_grid(conn, &month)?;
    println!("Market duty for {}", month);
    println!(
        "{}",
        pretty_table(&["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"], weeks)
    );
    Ok(())
}
