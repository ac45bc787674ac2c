// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{HashMap, HashSet};

use crate::api::{self, ApiClient, Slice, SliceSet, Snapshot, day_part};
use crate::config;
use crate::ledger;
use crate::models::{
    ADMIN_PAYER, DutyStatus, ExpenseCategory, ExpenseStatus, GuestMealType, MealType, Role,
};
use crate::utils::pretty_table;
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::{info, warn};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    let actor = ledger::actor_from(conn, m)?;
    match m.subcommand() {
        Some(("login", sub)) => {
            let client = client(conn)?;
            let username = sub.get_one::<String>("username").unwrap().trim();
            let password = sub.get_one::<String>("password").unwrap();
            let token = client.login(username, password)?;
            config::set_setting(conn, config::API_TOKEN_KEY, &token)?;
            info!(username, "logged in to backend");
            println!("Logged in as {}", username);
        }
        Some(("pull", sub)) => {
            actor.require_admin("pull from the backend")?;
            let wanted = if let Some(vals) = sub.get_many::<String>("only") {
                let mut set = SliceSet::default();
                for v in vals {
                    set.invalidate(v.parse::<Slice>()?);
                }
                set
            } else if sub.get_flag("stale") {
                config::stale_slices(conn)?
            } else {
                SliceSet::all()
            };
            if wanted.is_empty() {
                println!("Nothing changed locally since the last pull");
                return Ok(());
            }
            let client = client(conn)?;
            let snap = api::fetch_snapshot(&client, &wanted);
            let report = apply_snapshot(conn, &snap)?;
            let mut rows: Vec<Vec<String>> = report
                .iter()
                .map(|(slice, n, skipped)| {
                    vec![slice.to_string(), "ok".into(), n.to_string(), skipped.to_string()]
                })
                .collect();
            for (slice, err) in &snap.failures {
                rows.push(vec![
                    slice.to_string(),
                    format!("failed: {}", err),
                    "-".into(),
                    "-".into(),
                ]);
            }
            println!("{}", pretty_table(&["Slice", "Result", "Rows", "Skipped"], rows));
        }
        _ => {}
    }
    Ok(())
}

fn client(conn: &Connection) -> Result<ApiClient> {
    let base = config::api_base_url(conn)?.ok_or_else(|| {
        anyhow!(
            "No backend configured; run `messbook settings set --key {} --value <url>`",
            config::API_BASE_URL_KEY
        )
    })?;
    ApiClient::new(&base, config::api_token(conn)?)
}

fn remote_ids(tx: &Transaction<'_>) -> Result<HashMap<String, i64>> {
    let mut stmt =
        tx.prepare("SELECT remote_id, id FROM members WHERE remote_id IS NOT NULL")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
    let mut out = HashMap::new();
    for row in rows {
        let (rid, id) = row?;
        out.insert(rid, id);
    }
    Ok(out)
}

/// Replaces each fetched slice of the local ledger with the backend's copy
/// and clears its stale mark. Slices missing from the snapshot are left
/// untouched. Returns (slice, rows written, rows skipped) per applied slice.
pub fn apply_snapshot(
    conn: &mut Connection,
    snap: &Snapshot,
) -> Result<Vec<(Slice, usize, usize)>> {
    let tx = conn.transaction()?;
    let mut report = Vec::new();

    if let Some(members) = &snap.members {
        let mut written = 0;
        let mut skipped = 0;
        // local rows that survive the sweep, including ones whose update failed
        let mut keep: HashSet<i64> = HashSet::new();
        for m in members {
            let role = m
                .role
                .as_deref()
                .and_then(|r| r.parse::<Role>().ok())
                .unwrap_or(Role::Member);
            let dob = m.dob.as_deref().map(day_part);
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM members WHERE remote_id=?1 OR login=?2",
                    params![m.id, m.login],
                    |r| r.get(0),
                )
                .optional()?;
            let res = match existing {
                Some(id) => tx
                    .execute(
                        "UPDATE members SET name=?1, login=?2, deposit=?3, dob=?4, mobile=?5,
                         role=?6, remote_id=?7 WHERE id=?8",
                        params![
                            m.name,
                            m.login,
                            m.deposit.to_string(),
                            dob,
                            m.mobile,
                            role.as_str(),
                            m.id,
                            id
                        ],
                    )
                    .map(|_| id),
                None => tx
                    .execute(
                        "INSERT INTO members(name, login, deposit, dob, mobile, role, remote_id)
                         VALUES (?1,?2,?3,?4,?5,?6,?7)",
                        params![
                            m.name,
                            m.login,
                            m.deposit.to_string(),
                            dob,
                            m.mobile,
                            role.as_str(),
                            m.id
                        ],
                    )
                    .map(|_| tx.last_insert_rowid()),
            };
            match res {
                Ok(id) => {
                    keep.insert(id);
                    written += 1;
                }
                Err(e) => {
                    warn!(login = %m.login, error = %e, "skipping remote member");
                    if let Some(id) = existing {
                        keep.insert(id);
                    }
                    skipped += 1;
                }
            }
        }
        let locals: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM members")?;
            let rows = stmt.query_map([], |r| r.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        for id in locals.into_iter().filter(|id| !keep.contains(id)) {
            tx.execute("DELETE FROM members WHERE id=?1", params![id])?;
        }
        report.push((Slice::Members, written, skipped));
    }

    let ids = remote_ids(&tx)?;
    let local = |rid: &str| ids.get(rid).copied();

    if let Some(expenses) = &snap.expenses {
        tx.execute("DELETE FROM expenses", [])?;
        let (mut written, mut skipped) = (0, 0);
        for e in expenses {
            let category = match e.category.parse::<ExpenseCategory>() {
                Ok(c) => c,
                Err(err) => {
                    warn!(id = %e.id, error = %err, "skipping remote expense");
                    skipped += 1;
                    continue;
                }
            };
            let paid_by = if e.paid_by == ADMIN_PAYER {
                ADMIN_PAYER.to_string()
            } else if let Some(id) = local(e.paid_by.as_str()) {
                id.to_string()
            } else {
                warn!(id = %e.id, paid_by = %e.paid_by, "skipping expense from unknown member");
                skipped += 1;
                continue;
            };
            let status = e
                .status
                .as_deref()
                .and_then(|s| s.parse::<ExpenseStatus>().ok())
                .unwrap_or(ExpenseStatus::Approved);
            tx.execute(
                "INSERT INTO expenses(date, category, amount, paid_by, status, description)
                 VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    day_part(&e.date),
                    category.as_str(),
                    e.amount.to_string(),
                    paid_by,
                    status.as_str(),
                    e.description.clone().unwrap_or_default()
                ],
            )?;
            written += 1;
        }
        report.push((Slice::Expenses, written, skipped));
    }

    if let Some(meals) = &snap.meals {
        tx.execute("DELETE FROM meals", [])?;
        let (mut written, mut skipped) = (0, 0);
        for m in meals {
            let (Some(member_id), Ok(meal_type)) =
                (local(m.member_id.as_str()), m.meal_type.parse::<MealType>())
            else {
                skipped += 1;
                continue;
            };
            written += tx.execute(
                "INSERT OR IGNORE INTO meals(member_id, date, meal_type) VALUES (?1,?2,?3)",
                params![member_id, day_part(&m.date), meal_type.as_str()],
            )?;
        }
        report.push((Slice::Meals, written, skipped));
    }

    if let Some(guests) = &snap.guest_meals {
        tx.execute("DELETE FROM guest_meals", [])?;
        let (mut written, mut skipped) = (0, 0);
        for g in guests {
            let (Some(host), Ok(kind), Ok(time)) = (
                local(g.host_member_id.as_str()),
                g.guest_meal_type.parse::<GuestMealType>(),
                g.meal_time.parse::<MealType>(),
            ) else {
                skipped += 1;
                continue;
            };
            let price = match g.price {
                Some(p) => p,
                None => config::guest_price(&tx, kind)?,
            };
            tx.execute(
                "INSERT INTO guest_meals(date, host_member_id, guest_meal_type, meal_time,
                 quantity, unit_price) VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    day_part(&g.date),
                    host,
                    kind.as_str(),
                    time.as_str(),
                    g.quantity.max(1),
                    price.to_string()
                ],
            )?;
            written += 1;
        }
        report.push((Slice::GuestMeals, written, skipped));
    }

    if let Some(duties) = &snap.market {
        tx.execute("DELETE FROM market_duties", [])?;
        let (mut written, mut skipped) = (0, 0);
        for d in duties {
            let Some(member_id) = local(d.assigned_member_id.as_str()) else {
                skipped += 1;
                continue;
            };
            let status = d
                .status
                .as_deref()
                .and_then(|s| s.parse::<DutyStatus>().ok())
                .unwrap_or(DutyStatus::Pending);
            let n = tx.execute(
                "INSERT OR IGNORE INTO market_duties(date, member_id, status) VALUES (?1,?2,?3)",
                params![day_part(&d.date), member_id, status.as_str()],
            )?;
            if n == 0 {
                skipped += 1;
            }
            written += n;
        }
        report.push((Slice::Market, written, skipped));
    }

    config::clear_stale(&tx, report.iter().map(|(slice, _, _)| *slice))?;
    tx.commit().context("Failed to apply backend snapshot")?;
    for (slice, n, skipped) in &report {
        info!(slice = %slice, rows = n, skipped, "slice refreshed");
    }
    Ok(report)
}
