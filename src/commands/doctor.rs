// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashSet;

use crate::ledger;
use crate::models::{ExpenseStatus, Payer};
use crate::utils::{fmt_amount, parse_month, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let month = match m.get_one::<String>("month") {
        Some(s) => Some(parse_month(s)?),
        None => None,
    };
    let rows = check(conn, month.as_deref())?;
    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

pub fn check(conn: &Connection, month: Option<&str>) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let members = ledger::load_members(conn)?;
    let known: HashSet<i64> = members.iter().map(|m| m.id).collect();

    // 1) Expenses still waiting for a decision
    let expenses = ledger::load_expenses(conn, month)?;
    for e in expenses.iter().filter(|e| e.status == ExpenseStatus::Pending) {
        rows.push(vec![
            "pending_expense".into(),
            format!("#{} {} {} on {}", e.id, e.category, fmt_amount(&e.amount), e.date),
        ]);
    }

    // 2) Expenses paid by members who no longer exist
    for e in &expenses {
        if let Payer::Member(id) = e.paid_by {
            if !known.contains(&id) {
                rows.push(vec!["orphan_expense".into(), format!("#{} paid by #{}", e.id, id)]);
            }
        }
    }

    // 3) Members the mess owes money before any billing
    for m in members.iter().filter(|m| m.deposit < Decimal::ZERO) {
        rows.push(vec![
            "negative_deposit".into(),
            format!("{} {}", m.name, fmt_amount(&m.deposit)),
        ]);
    }

    // 4) Members with no meals at all this month are billed the minimum
    if let Some(month) = month {
        let eaten: HashSet<i64> = ledger::load_meals(conn, Some(month))?
            .into_iter()
            .map(|m| m.member_id)
            .collect();
        for m in members.iter().filter(|m| !eaten.contains(&m.id)) {
            rows.push(vec!["no_meals".into(), format!("{} in {}", m.name, month)]);
        }
    }
    Ok(rows)
}
