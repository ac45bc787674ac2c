// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::billing;
use crate::errors::MessError;
use crate::ledger::{self, Actor};
use crate::models::{MonthlySummary, PaymentStatus};
use crate::utils::{fmt_amount, maybe_print_json, parse_decimal, parse_month, pretty_table};
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("submit", sub)) => {
            let actor = ledger::actor_from(conn, sub)?;
            let month = parse_month(sub.get_one::<String>("month").unwrap())?;
            let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let member = match (sub.get_one::<String>("member"), &actor) {
                (Some(name), _) => ledger::member_by_name(conn, name)?,
                (None, Actor::Member(me)) => me.clone(),
                (None, Actor::Admin) => {
                    return Err(anyhow!("--member is required when acting as admin"));
                }
            };
            if let Actor::Member(me) = &actor {
                if me.id != member.id && !actor.is_privileged() {
                    return Err(MessError::PermissionDenied(
                        "members can only submit their own payments".to_string(),
                    )
                    .into());
                }
            }
            let total = submit(conn, member.id, &month, amount)?;
            println!(
                "{} claims {} paid for {}",
                member.name,
                fmt_amount(&total),
                month
            );
        }
        Some(("status", sub)) => status(conn, sub)?,
        _ => {}
    }
    Ok(())
}

/// Adds a member-claimed payment for `month`; returns the running claim.
pub fn submit(conn: &Connection, member_id: i64, month: &str, amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(anyhow!("Submitted amount must be positive, got {}", amount));
    }
    let current: Option<String> = conn
        .query_row(
            "SELECT submitted_amount FROM monthly_summaries WHERE month=?1 AND member_id=?2",
            params![month, member_id],
            |r| r.get(0),
        )
        .optional()?;
    let current = match current {
        Some(s) => s
            .parse::<Decimal>()
            .with_context(|| format!("Invalid submitted amount '{}' for {}", s, month))?,
        None => Decimal::ZERO,
    };
    let total = current + amount;
    conn.execute(
        "INSERT INTO monthly_summaries(month, member_id, submitted_amount) VALUES (?1, ?2, ?3)
         ON CONFLICT(month, member_id) DO UPDATE SET submitted_amount=excluded.submitted_amount",
        params![month, member_id, total.to_string()],
    )?;
    info!(member_id, month, %amount, %total, "payment submitted");
    Ok(total)
}

/// Persisted summaries for `month` with received amounts and status derived
/// from the current ledger. Members without a closed summary are owed nothing yet.
pub fn month_status(conn: &Connection, month: &str) -> Result<Vec<(String, MonthlySummary)>> {
    let mut out = Vec::new();
    for member in ledger::load_members(conn)? {
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT deposit_balance, submitted_amount FROM monthly_summaries
                 WHERE month=?1 AND member_id=?2",
                params![month, member.id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let (balance, submitted) = match row {
            Some((b, s)) => (
                b.parse::<Decimal>().with_context(|| {
                    format!("Invalid deposit balance '{}' for {}", b, member.name)
                })?,
                s.parse::<Decimal>().with_context(|| {
                    format!("Invalid submitted amount '{}' for {}", s, member.name)
                })?,
            ),
            None => (Decimal::ZERO, Decimal::ZERO),
        };
        let received = ledger::received_amount(conn, member.id, month)?;
        out.push((
            member.name,
            MonthlySummary {
                month: month.to_string(),
                member_id: member.id,
                deposit_balance: balance,
                submitted_amount: submitted,
                received_amount: received,
                payment_status: billing::payment_status(received, balance),
            },
        ));
    }
    Ok(out)
}

fn status(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let data = month_status(conn, &month)?;
    let summaries: Vec<&MonthlySummary> = data.iter().map(|(_, s)| s).collect();
    if !maybe_print_json(json_flag, jsonl_flag, &summaries)? {
        let rows = data
            .iter()
            .map(|(name, s)| {
                vec![
                    name.clone(),
                    fmt_amount(&s.deposit_balance),
                    fmt_amount(&s.submitted_amount),
                    fmt_amount(&s.received_amount),
                    s.payment_status.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Member", "Owed", "Submitted", "Received", "Status"], rows)
        );
        let clear = data
            .iter()
            .filter(|(_, s)| s.payment_status == PaymentStatus::Clear)
            .count();
        println!("{}/{} clear", clear, data.len());
    }
    Ok(())
}
