// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::billing;
use crate::commands::summary;
use crate::config;
use crate::errors::MessError;
use crate::ledger::{self, Actor};
use crate::models::PaymentStatus;
use crate::utils::{fmt_money, parse_month, pretty_table};
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub month: String,
    pub member: String,
    pub currency: String,
    pub actual_meals: u32,
    pub billed_meals: u32,
    pub meal_charge: Decimal,
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

pub fn build_invoices(
    conn: &Connection,
    month: &str,
    member: Option<&str>,
) -> Result<Vec<Invoice>> {
    let only = match member {
        Some(name) => Some(ledger::member_by_name(conn, name)?.id),
        None => None,
    };
    let currency = config::currency(conn)?;
    let bill = summary::compute(conn, month)?;
    let mut out = Vec::new();
    for b in bill
        .members
        .iter()
        .filter(|b| only.is_none_or(|id| id == b.member_id))
    {
        let received = ledger::received_amount(conn, b.member_id, month)?;
        out.push(Invoice {
            month: month.to_string(),
            member: b.name.clone(),
            currency: currency.clone(),
            actual_meals: b.actual_meals,
            billed_meals: b.effective_meals,
            meal_charge: bill.meal_charge.round_dp(2),
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

pub fn render_text(inv: &Invoice) -> String {
    let money = |d: &Decimal| fmt_money(d, &inv.currency);
    let rows = vec![
        vec![
            format!("Meals ({} eaten, {} billed)", inv.actual_meals, inv.billed_meals),
            format!("{} x {}", inv.billed_meals, money(&inv.meal_charge)),
            money(&inv.meal_cost),
        ],
        vec!["Shared bills (per head)".into(), String::new(), money(&inv.per_head)],
        vec!["Guest meals".into(), String::new(), money(&inv.guest_meal_cost)],
        vec!["Total".into(), String::new(), money(&inv.total)],
        vec!["Less deposit".into(), String::new(), money(&inv.deposit)],
        vec![
            "Less market purchases".into(),
            String::new(),
            money(&inv.market_contribution),
        ],
        vec![
            if inv.balance.is_sign_negative() {
                "Refund due".into()
            } else {
                "Balance due".into()
            },
            String::new(),
            money(&inv.balance.abs()),
        ],
    ];
    format!(
        "Invoice {} for {}\n{}\nReceived this month: {} ({})\n",
        inv.month,
        inv.member,
        pretty_table(&["Item", "Rate", "Amount"], rows),
        money(&inv.received),
        inv.payment_status
    )
}

fn write_csv(invoices: &[Invoice], out: &str) -> Result<()> {
    let mut wtr = csv::Writer::from_path(out)?;
    for inv in invoices {
        wtr.serialize(inv)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let actor = ledger::actor_from(conn, m)?;
    let month = parse_month(m.get_one::<String>("month").unwrap())?;
    let requested = m.get_one::<String>("member").map(|s| s.as_str());
    // members only see their own invoice
    let member = match (&actor, requested) {
        (Actor::Member(me), None) if !actor.is_privileged() => Some(me.name.as_str()),
        (Actor::Member(me), Some(name)) if !actor.is_privileged() => {
            if ledger::member_by_name(conn, name)?.id != me.id {
                return Err(MessError::PermissionDenied(
                    "members can only view their own invoice".to_string(),
                )
                .into());
            }
            Some(name)
        }
        (_, other) => other,
    };
    let fmt = m.get_one::<String>("format").unwrap().to_lowercase();
    let out = m.get_one::<String>("out").map(|s| s.trim().to_string());

    let invoices = build_invoices(conn, &month, member)?;
    match (fmt.as_str(), out) {
        ("text", None) => {
            for inv in &invoices {
                println!("{}", render_text(inv));
            }
        }
        ("text", Some(path)) => {
            let body: Vec<String> = invoices.iter().map(render_text).collect();
            std::fs::write(&path, body.join("\n"))?;
            println!("Wrote {} invoice(s) to {}", invoices.len(), path);
        }
        ("json", None) => println!("{}", serde_json::to_string_pretty(&invoices)?),
        ("json", Some(path)) => {
            std::fs::write(&path, serde_json::to_string_pretty(&invoices)?)?;
            println!("Wrote {} invoice(s) to {}", invoices.len(), path);
        }
        ("csv", Some(path)) => {
            write_csv(&invoices, &path)?;
            println!("Wrote {} invoice(s) to {}", invoices.len(), path);
        }
        ("csv", None) => return Err(anyhow!("--out is required for csv invoices")),
        (other, _) => return Err(anyhow!("Unknown format: {} (use text|csv|json)", other)),
    }
    info!(month = %month, count = invoices.len(), format = fmt.as_str(), "invoices rendered");
    Ok(())
}
