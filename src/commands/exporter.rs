// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use crate::ledger;
use crate::models::Payer;
use crate::utils::parse_month;
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("expenses", sub)) => export_expenses(conn, sub),
        Some(("meals", sub)) => export_meals(conn, sub),
        _ => Ok(()),
    }
}

fn export_args(sub: &clap::ArgMatches) -> Result<(String, String, Option<String>)> {
    let fmt = sub.get_one::<String>("format").unwrap().trim().to_lowercase();
    if fmt != "csv" && fmt != "json" {
        return Err(anyhow!("Unknown format: {} (use csv|json)", fmt));
    }
    let out = sub.get_one::<String>("out").unwrap().trim().to_string();
    let month = match sub.get_one::<String>("month") {
        Some(m) => Some(parse_month(m)?),
        None => None,
    };
    Ok((fmt, out, month))
}

fn member_names(conn: &Connection) -> Result<HashMap<i64, String>> {
    Ok(ledger::load_members(conn)?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect())
}

fn export_expenses(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (fmt, out, month) = export_args(sub)?;
    let names = member_names(conn)?;
    let expenses = ledger::load_expenses(conn, month.as_deref())?;
    let payer = |p: Payer| match p {
        Payer::Admin => "admin".to_string(),
        Payer::Member(id) => names.get(&id).cloned().unwrap_or_else(|| id.to_string()),
    };

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(&out)?;
            wtr.write_record([
                "date", "category", "amount", "paid_by", "status", "description",
            ])?;
            for e in &expenses {
                wtr.write_record([
                    e.date.to_string(),
                    e.category.to_string(),
                    e.amount.to_string(),
                    payer(e.paid_by),
                    e.status.as_str().to_string(),
                    e.description.clone(),
                ])?;
            }
            wtr.flush()?;
        }
        _ => {
            let items: Vec<_> = expenses
                .iter()
                .map(|e| {
                    json!({
                        "date": e.date.to_string(),
                        "category": e.category.as_str(),
                        "amount": e.amount.to_string(),
                        "paid_by": payer(e.paid_by),
                        "status": e.status.as_str(),
                        "description": e.description
                    })
                })
                .collect();
            std::fs::write(&out, serde_json::to_string_pretty(&items)?)?;
        }
    }
    println!("Exported {} expense(s) to {}", expenses.len(), out);
    Ok(())
}

fn export_meals(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (fmt, out, month) = export_args(sub)?;
    let names = member_names(conn)?;
    let meals = ledger::load_meals(conn, month.as_deref())?;
    let name = |id: i64| names.get(&id).cloned().unwrap_or_else(|| id.to_string());

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(&out)?;
            wtr.write_record(["date", "member", "meal_type"])?;
            for m in &meals {
                wtr.write_record([
                    m.date.to_string(),
                    name(m.member_id),
                    m.meal_type.as_str().to_string(),
                ])?;
            }
            wtr.flush()?;
        }
        _ => {
            let items: Vec<_> = meals
                .iter()
                .map(|m| {
                    json!({
                        "date": m.date.to_string(),
                        "member": name(m.member_id),
                        "meal_type": m.meal_type.as_str()
                    })
                })
                .collect();
            std::fs::write(&out, serde_json::to_string_pretty(&items)?)?;
        }
    }
    println!("Exported {} meal(s) to {}", meals.len(), out);
    Ok(())
}
