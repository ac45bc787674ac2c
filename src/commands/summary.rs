// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::billing::{self, MonthlyBill};
use crate::config;
use crate::ledger;
use crate::models::PaymentStatus;
use crate::utils::{fmt_amount, maybe_print_json, parse_month, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("show", sub)) => show(conn, sub)?,
        Some(("close", sub)) => {
            let actor = ledger::actor_from(conn, sub)?;
            actor.require_privileged("close a month")?;
            let month = parse_month(sub.get_one::<String>("month").unwrap())?;
            let n = close_month(conn, &month)?;
            println!("Closed {} for {} member(s)", month, n);
        }
        _ => {}
    }
    Ok(())
}

/// Runs the reconciliation for `month` against the current ledger.
pub fn compute(conn: &Connection, month: &str) -> Result<MonthlyBill> {
    let inputs = ledger::month_inputs(conn, month)?;
    let policy = config::billing_policy(conn)?;
    Ok(billing::reconcile(&inputs, policy))
}

#[derive(Debug, Serialize)]
pub struct SummaryRow {
    pub member: String,
    pub actual_meals: u32,
    pub effective_meals: u32,
    pub meal_cost: Decimal,
    pub per_head: Decimal,
    pub guest_meal_cost: Decimal,
    pub total: Decimal,
    pub deposit: Decimal,
    pub market_contribution: Decimal,
    pub balance: Decimal,
    pub received: Decimal,
    pub payment_status: PaymentStatus,
}

pub fn summary_rows(
    conn: &Connection,
    bill: &MonthlyBill,
    month: &str,
) -> Result<Vec<SummaryRow>> {
    let mut out = Vec::with_capacity(bill.members.len());
    for b in &bill.members {
        let received = ledger::received_amount(conn, b.member_id, month)?;
        out.push(SummaryRow {
            member: b.name.clone(),
            actual_meals: b.actual_meals,
            effective_meals: b.effective_meals,
            meal_cost: b.meal_cost.round_dp(2),
            per_head: b.per_head.round_dp(2),
            guest_meal_cost: b.guest_meal_cost.round_dp(2),
            total: b.total.round_dp(2),
            deposit: b.deposit.round_dp(2),
            market_contribution: b.market_contribution.round_dp(2),
            balance: b.balance.round_dp(2),
            received,
            payment_status: billing::payment_status(received, b.owed_before(received)),
        });
    }
    Ok(out)
}

/// Freezes every member's amount due for `month`, before any of the month's
/// receipts, so payments are measured against it. Re-closing a month
/// overwrites the amounts but keeps submitted claims.
pub fn close_month(conn: &Connection, month: &str) -> Result<usize> {
    let bill = compute(conn, month)?;
    let tx = conn.unchecked_transaction()?;
    for b in &bill.members {
        let received = ledger::received_amount(&tx, b.member_id, month)?;
        let due = b.owed_before(received).round_dp(2);
        tx.execute(
            "INSERT INTO monthly_summaries(month, member_id, deposit_balance, closed_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(month, member_id) DO UPDATE SET
                deposit_balance=excluded.deposit_balance, closed_at=excluded.closed_at",
            params![month, b.member_id, due.to_string()],
        )?;
    }
    tx.commit()?;
    info!(month, members = bill.members.len(), "month closed");
    Ok(bill.members.len())
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let bill = compute(conn, &month)?;
    let rows = summary_rows(conn, &bill, &month)?;
    if maybe_print_json(json_flag, jsonl_flag, &rows)? {
        return Ok(());
    }

    let ccy = config::currency(conn)?;
    println!(
        "{} | shared bills {} | per head {} | market {} | rice {} | guests {} | \
         billed meals {} | meal charge {}",
        month,
        fmt_amount(&bill.shared_bills),
        fmt_amount(&bill.per_head),
        fmt_amount(&bill.total_market),
        fmt_amount(&bill.total_rice),
        fmt_amount(&bill.guest_adjustment),
        bill.total_adjusted_meals,
        fmt_amount(&bill.meal_charge),
    );
    let data = rows
        .iter()
        .map(|r| {
            vec![
                r.member.clone(),
                format!("{} ({})", r.actual_meals, r.effective_meals),
                fmt_amount(&r.meal_cost),
                fmt_amount(&r.per_head),
                fmt_amount(&r.guest_meal_cost),
                fmt_amount(&r.total),
                fmt_amount(&r.deposit),
                fmt_amount(&r.market_contribution),
                fmt_amount(&r.balance),
                fmt_amount(&r.received),
                r.payment_status.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &[
                "Member",
                "Meals (billed)",
                "Meal Cost",
                "Per Head",
                "Guests",
                "Total",
                "Deposit",
                "Market",
                &format!("Balance ({})", ccy),
                "Received",
                "Status",
            ],
            data
        )
    );
    Ok(())
}
