// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::api::Slice;
use crate::config;
use crate::errors::MessError;
use crate::ledger::{self, Actor};
use crate::models::{ExpenseCategory, ExpenseStatus, Payer};
use crate::utils::{
    fmt_amount, maybe_print_json, parse_date, parse_decimal, parse_month, pretty_table,
};
use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("approve", sub)) => decide(conn, sub, ExpenseStatus::Approved)?,
        Some(("reject", sub)) => decide(conn, sub, ExpenseStatus::Rejected)?,
        Some(("rm", sub)) => remove(conn, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub category: ExpenseCategory,
    pub amount: Decimal,
    pub paid_by: Option<Payer>,
    pub description: String,
}

/// Records an expense for `actor`. Entries by the admin or a manager are
/// approved on the spot; members may only enter market purchases and
/// deposits, which wait for approval. Returns the new id and its status.
pub fn record_expense(
    conn: &Connection,
    actor: &Actor,
    new: NewExpense,
) -> Result<(i64, ExpenseStatus)> {
    if new.amount <= Decimal::ZERO {
        return Err(anyhow!("Expense amount must be positive, got {}", new.amount));
    }
    let (paid_by, status) = if actor.is_privileged() {
        (new.paid_by.unwrap_or_else(|| actor.payer()), ExpenseStatus::Approved)
    } else {
        if !matches!(new.category, ExpenseCategory::Market | ExpenseCategory::Deposit) {
            return Err(MessError::CategoryNotAllowed(new.category.to_string()).into());
        }
        let own = actor.payer();
        if new.paid_by.is_some_and(|p| p != own) {
            return Err(MessError::PermissionDenied(
                "members can only record their own expenses".to_string(),
            )
            .into());
        }
        (own, ExpenseStatus::Pending)
    };
    if new.category == ExpenseCategory::Deposit && paid_by == Payer::Admin {
        return Err(anyhow!("A deposit must name the member who paid it"));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO expenses(date, category, amount, paid_by, status, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.date.to_string(),
            new.category.as_str(),
            new.amount.to_string(),
            paid_by.to_db(),
            status.as_str(),
            new.description
        ],
    )?;
    let id = tx.last_insert_rowid();
    if status == ExpenseStatus::Approved && new.category == ExpenseCategory::Deposit {
        if let Payer::Member(member_id) = paid_by {
            ledger::adjust_deposit(&tx, member_id, new.amount)?;
        }
    }
    config::mark_stale(&tx, Slice::Expenses)?;
    tx.commit()?;
    info!(
        id,
        category = %new.category,
        amount = %new.amount,
        status = status.as_str(),
        by = %actor.label(),
        "expense recorded"
    );
    Ok((id, status))
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let actor = ledger::actor_from(conn, sub)?;
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;
    let category = sub
        .get_one::<String>("category")
        .unwrap()
        .parse::<ExpenseCategory>()?;
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let paid_by = match sub.get_one::<String>("paid_by").map(|s| s.trim()) {
        Some(name) if name.eq_ignore_ascii_case("admin") => Some(Payer::Admin),
        Some(name) => Some(Payer::Member(ledger::member_by_name(conn, name)?.id)),
        None => None,
    };
    let description = sub
        .get_one::<String>("description")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let (id, status) = record_expense(
        conn,
        &actor,
        NewExpense {
            date,
            category,
            amount,
            paid_by,
            description,
        },
    )?;
    println!(
        "Recorded expense #{} ({} {} on {}) as {}",
        id,
        category,
        amount,
        date,
        status.as_str()
    );
    Ok(())
}

/// Moves a pending expense to approved or rejected, crediting deposits on approval.
pub fn set_status(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    decision: ExpenseStatus,
) -> Result<()> {
    actor.require_privileged("approve or reject expenses")?;
    let expense = ledger::expense_by_id(conn, id)?;
    if expense.status != ExpenseStatus::Pending {
        return Err(MessError::AlreadyDecided {
            kind: "Expense",
            id,
            status: expense.status.as_str().to_string(),
        }
        .into());
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE expenses SET status=?1 WHERE id=?2",
        params![decision.as_str(), id],
    )?;
    if let Payer::Member(member_id) = expense.paid_by {
        if decision == ExpenseStatus::Approved && expense.category == ExpenseCategory::Deposit {
            ledger::adjust_deposit(&tx, member_id, expense.amount)?;
        }
        ledger::notify(
            &tx,
            member_id,
            &format!(
                "Your {} expense of {} on {} was {}",
                expense.category,
                fmt_amount(&expense.amount),
                expense.date,
                decision.as_str()
            ),
        )?;
    }
    config::mark_stale(&tx, Slice::Expenses)?;
    tx.commit()?;
    info!(id, status = decision.as_str(), by = %actor.label(), "expense decided");
    Ok(())
}

fn decide(
    conn: &Connection,
    sub: &clap::ArgMatches,
    decision: ExpenseStatus,
) -> Result<()> {
    let actor = ledger::actor_from(conn, sub)?;
    let id = *sub.get_one::<i64>("id").unwrap();
    set_status(conn, &actor, id, decision)?;
    println!("Expense #{} {}", id, decision.as_str());
    Ok(())
}

fn remove(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let actor = ledger::actor_from(conn, sub)?;
    actor.require_privileged("delete expenses")?;
    let id = *sub.get_one::<i64>("id").unwrap();
    let expense = ledger::expense_by_id(conn, id)?;

    let tx = conn.unchecked_transaction()?;
    if expense.status == ExpenseStatus::Approved && expense.category == ExpenseCategory::Deposit {
        if let Payer::Member(member_id) = expense.paid_by {
            ledger::adjust_deposit(&tx, member_id, -expense.amount)?;
        }
    }
    tx.execute("DELETE FROM expenses WHERE id=?1", params![id])?;
    config::mark_stale(&tx, Slice::Expenses)?;
    tx.commit()?;
    info!(id, "expense deleted");
    println!("Removed expense #{}", id);
    Ok(())
}

#[derive(Serialize)]
pub struct ExpenseRow {
    pub id: i64,
    pub date: String,
    pub category: String,
    pub amount: String,
    pub paid_by: String,
    pub status: String,
    pub description: String,
}

pub fn query_rows(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<ExpenseRow>> {
    let month = match sub.get_one::<String>("month") {
        Some(m) => Some(parse_month(m)?),
        None => None,
    };
    let category = match sub.get_one::<String>("category") {
        Some(c) => Some(c.parse::<ExpenseCategory>()?),
        None => None,
    };
    let status = match sub.get_one::<String>("status") {
        Some(s) => Some(s.parse::<ExpenseStatus>()?),
        None => None,
    };

    let names: std::collections::HashMap<i64, String> = ledger::load_members(conn)?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect();

    let rows = ledger::load_expenses(conn, month.as_deref())?
        .into_iter()
        .filter(|e| category.is_none_or(|c| e.category == c))
        .filter(|e| status.is_none_or(|s| e.status == s))
        .map(|e| ExpenseRow {
            id: e.id,
            date: e.date.to_string(),
            category: e.category.to_string(),
            amount: fmt_amount(&e.amount),
            paid_by: match e.paid_by {
                Payer::Admin => "admin".to_string(),
                Payer::Member(id) => names
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| format!("#{}", id)),
            },
            status: e.status.as_str().to_string(),
            description: e.description,
        })
        .collect();
    Ok(rows)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let data = query_rows(conn, sub)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.date.clone(),
                    r.category.clone(),
                    r.amount.clone(),
                    r.paid_by.clone(),
                    r.status.clone(),
                    r.description.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Date", "Category", "Amount", "Paid By", "Status", "Description"],
                rows
            )
        );
    }
    Ok(())
}
