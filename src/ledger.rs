// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Typed reads over the SQLite ledger and the few writes shared by several
//! commands (deposit adjustments, notifications).

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use tracing::debug;

use crate::api::Slice;
use crate::billing::MonthInputs;
use crate::config;
use crate::errors::MessError;
use crate::models::{
    Expense, ExpenseCategory, ExpenseStatus, GuestMeal, MarketDuty, MealRecord, Member, Payer,
    Role,
};

/// Who is running a command: the administrator, or a member acting for themselves.
#[derive(Debug, Clone)]
pub enum Actor {
    Admin,
    Member(Member),
}

impl Actor {
    /// Admin and managers may approve, reject and manage schedules.
    pub fn is_privileged(&self) -> bool {
        match self {
            Actor::Admin => true,
            Actor::Member(m) => m.role == Role::Manager,
        }
    }

    pub fn payer(&self) -> Payer {
        match self {
            Actor::Admin => Payer::Admin,
            Actor::Member(m) => Payer::Member(m.id),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Actor::Admin => "admin".to_string(),
            Actor::Member(m) => m.name.clone(),
        }
    }

    pub fn require_privileged(&self, action: &str) -> Result<()> {
        if self.is_privileged() {
            Ok(())
        } else {
            Err(MessError::PermissionDenied(format!(
                "only the admin or a manager can {}",
                action
            ))
            .into())
        }
    }

    pub fn require_admin(&self, action: &str) -> Result<()> {
        match self {
            Actor::Admin => Ok(()),
            Actor::Member(_) => {
                Err(MessError::PermissionDenied(format!("only the admin can {}", action)).into())
            }
        }
    }
}

/// Resolves the global `--as` flag; absent means the admin is acting.
pub fn actor_from(conn: &Connection, m: &clap::ArgMatches) -> Result<Actor> {
    let name = m
        .try_get_one::<String>("as")
        .ok()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());
    match name {
        None => Ok(Actor::Admin),
        Some(n) if n.eq_ignore_ascii_case("admin") => Ok(Actor::Admin),
        Some(n) => Ok(Actor::Member(member_by_name(conn, n)?)),
    }
}

type MemberRow = (i64, String, String, String, Option<String>, Option<String>, String);

fn member_from_row(row: MemberRow) -> Result<Member> {
    let (id, name, login, deposit, dob, mobile, role) = row;
    let deposit = deposit
        .parse::<Decimal>()
        .with_context(|| format!("Invalid deposit '{}' for member {}", deposit, name))?;
    let dob = match dob {
        Some(d) => Some(
            NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                .with_context(|| format!("Invalid date of birth '{}' for {}", d, name))?,
        ),
        None => None,
    };
    Ok(Member {
        id,
        name,
        login,
        deposit,
        dob,
        mobile,
        role: role.parse::<Role>()?,
    })
}

const MEMBER_COLS: &str = "id, name, login, deposit, dob, mobile, role";

fn read_member_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
    ))
}

pub fn member_by_name(conn: &Connection, name: &str) -> Result<Member> {
    let name = name.trim();
    let row = conn
        .query_row(
            &format!("SELECT {MEMBER_COLS} FROM members WHERE name=?1 OR login=?1"),
            params![name],
            read_member_row,
        )
        .optional()?
        .ok_or_else(|| MessError::UnknownMember(name.to_string()))?;
    member_from_row(row)
}

pub fn member_by_id(conn: &Connection, id: i64) -> Result<Member> {
    let row = conn
        .query_row(
            &format!("SELECT {MEMBER_COLS} FROM members WHERE id=?1"),
            params![id],
            read_member_row,
        )
        .optional()?
        .ok_or_else(|| MessError::UnknownMember(format!("#{}", id)))?;
    member_from_row(row)
}

pub fn load_members(conn: &Connection) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(&format!("SELECT {MEMBER_COLS} FROM members ORDER BY name"))?;
    let rows = stmt.query_map([], read_member_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(member_from_row(row?)?);
    }
    Ok(out)
}

fn month_filter(month: Option<&str>) -> (&'static str, Vec<String>) {
    match month {
        Some(m) => (" WHERE substr(date,1,7)=?1", vec![m.to_string()]),
        None => ("", Vec::new()),
    }
}

pub fn load_expenses(conn: &Connection, month: Option<&str>) -> Result<Vec<Expense>> {
    let (filter, args) = month_filter(month);
    let mut stmt = conn.prepare(&format!(
        "SELECT id, date, category, amount, paid_by, status, description
         FROM expenses{filter} ORDER BY date, id"
    ))?;
    let mut rows = stmt.query(rusqlite::params_from_iter(args))?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        let id: i64 = r.get(0)?;
        let date: String = r.get(1)?;
        let category: String = r.get(2)?;
        let amount: String = r.get(3)?;
        let paid_by: String = r.get(4)?;
        let status: String = r.get(5)?;
        let description: String = r.get(6)?;
        out.push(Expense {
            id,
            date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}' on expense #{}", date, id))?,
            category: category.parse::<ExpenseCategory>()?,
            amount: amount
                .parse::<Decimal>()
                .with_context(|| format!("Invalid amount '{}' on expense #{}", amount, id))?,
            paid_by: Payer::from_db(&paid_by)?,
            status: status.parse::<ExpenseStatus>()?,
            description,
        });
    }
    Ok(out)
}

pub fn expense_by_id(conn: &Connection, id: i64) -> Result<Expense> {
    let mut stmt = conn.prepare(
        "SELECT date, category, amount, paid_by, status, description FROM expenses WHERE id=?1",
    )?;
    let row: Option<(String, String, String, String, String, String)> = stmt
        .query_row(params![id], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?))
        })
        .optional()?;
    let (date, category, amount, paid_by, status, description) =
        row.ok_or(MessError::NotFound { kind: "Expense", id })?;
    Ok(Expense {
        id,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}' on expense #{}", date, id))?,
        category: category.parse::<ExpenseCategory>()?,
        amount: amount
            .parse::<Decimal>()
            .with_context(|| format!("Invalid amount '{}' on expense #{}", amount, id))?,
        paid_by: Payer::from_db(&paid_by)?,
        status: status.parse::<ExpenseStatus>()?,
        description,
    })
}

pub fn load_meals(conn: &Connection, month: Option<&str>) -> Result<Vec<MealRecord>> {
    let (filter, args) = month_filter(month);
    let mut stmt = conn.prepare(&format!(
        "SELECT member_id, date, meal_type FROM meals{filter} ORDER BY date, member_id, meal_type"
    ))?;
    let mut rows = stmt.query(rusqlite::params_from_iter(args))?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        let member_id: i64 = r.get(0)?;
        let date: String = r.get(1)?;
        let meal_type: String = r.get(2)?;
        out.push(MealRecord {
            member_id,
            date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("Invalid meal date '{}'", date))?,
            meal_type: meal_type.parse()?,
        });
    }
    Ok(out)
}

pub fn load_guest_meals(conn: &Connection, month: Option<&str>) -> Result<Vec<GuestMeal>> {
    let (filter, args) = month_filter(month);
    let mut stmt = conn.prepare(&format!(
        "SELECT id, date, host_member_id, guest_meal_type, meal_time, quantity, unit_price
         FROM guest_meals{filter} ORDER BY date, id"
    ))?;
    let mut rows = stmt.query(rusqlite::params_from_iter(args))?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        let id: i64 = r.get(0)?;
        let date: String = r.get(1)?;
        let host_member_id: i64 = r.get(2)?;
        let guest_meal_type: String = r.get(3)?;
        let meal_time: String = r.get(4)?;
        let quantity: u32 = r.get(5)?;
        let unit_price: String = r.get(6)?;
        out.push(GuestMeal {
            id,
            date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}' on guest meal #{}", date, id))?,
            host_member_id,
            guest_meal_type: guest_meal_type.parse()?,
            meal_time: meal_time.parse()?,
            quantity,
            unit_price: unit_price
                .parse::<Decimal>()
                .with_context(|| format!("Invalid price '{}' on guest meal #{}", unit_price, id))?,
        });
    }
    Ok(out)
}

pub fn load_duties(conn: &Connection, month: Option<&str>) -> Result<Vec<MarketDuty>> {
    let (filter, args) = month_filter(month);
    let mut stmt = conn.prepare(&format!(
        "SELECT id, date, member_id, status FROM market_duties{filter} ORDER BY date, id"
    ))?;
    let mut rows = stmt.query(rusqlite::params_from_iter(args))?;
    let mut out = Vec::new();
    while let Some(r) = rows.next()? {
        let id: i64 = r.get(0)?;
        let date: String = r.get(1)?;
        let member_id: i64 = r.get(2)?;
        let status: String = r.get(3)?;
        out.push(MarketDuty {
            id,
            date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}' on duty #{}", date, id))?,
            member_id,
            status: status.parse()?,
        });
    }
    Ok(out)
}

/// Everything the billing calculator needs for `month`.
pub fn month_inputs(conn: &Connection, month: &str) -> Result<MonthInputs> {
    let inputs = MonthInputs {
        members: load_members(conn)?,
        expenses: load_expenses(conn, Some(month))?,
        meals: load_meals(conn, Some(month))?,
        guest_meals: load_guest_meals(conn, Some(month))?,
    };
    debug!(
        month,
        members = inputs.members.len(),
        expenses = inputs.expenses.len(),
        meals = inputs.meals.len(),
        guest_meals = inputs.guest_meals.len(),
        "loaded month inputs"
    );
    Ok(inputs)
}

/// Adds `delta` (possibly negative) to a member's running deposit.
pub fn adjust_deposit(conn: &Connection, member_id: i64, delta: Decimal) -> Result<Decimal> {
    let current: String = conn
        .query_row(
            "SELECT deposit FROM members WHERE id=?1",
            params![member_id],
            |r| r.get(0),
        )
        .optional()?
        .ok_or_else(|| MessError::UnknownMember(format!("#{}", member_id)))?;
    let current = current
        .parse::<Decimal>()
        .with_context(|| format!("Invalid deposit '{}' for member #{}", current, member_id))?;
    let updated = current + delta;
    conn.execute(
        "UPDATE members SET deposit=?1 WHERE id=?2",
        params![updated.to_string(), member_id],
    )?;
    config::mark_stale(conn, Slice::Members)?;
    debug!(member_id, %delta, %updated, "deposit adjusted");
    Ok(updated)
}

/// Sum of approved deposit entries a member made in `month`.
pub fn received_amount(conn: &Connection, member_id: i64, month: &str) -> Result<Decimal> {
    let mut stmt = conn.prepare(
        "SELECT amount FROM expenses WHERE category='deposit' AND status='approved'
         AND paid_by=?1 AND substr(date,1,7)=?2",
    )?;
    let mut rows = stmt.query(params![member_id.to_string(), month])?;
    let mut total = Decimal::ZERO;
    while let Some(r) = rows.next()? {
        let a: String = r.get(0)?;
        total += a
            .parse::<Decimal>()
            .with_context(|| format!("Invalid deposit amount '{}'", a))?;
    }
    Ok(total)
}

pub fn notify(conn: &Connection, member_id: i64, message: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications(member_id, message) VALUES (?1, ?2)",
        params![member_id, message],
    )?;
    Ok(())
}
