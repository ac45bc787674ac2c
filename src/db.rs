// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Messbook", "messbook"));

/// Environment variable pointing at an explicit database file.
pub const DB_ENV: &str = "MESSBOOK_DB";

pub fn db_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(DB_ENV) {
        let p = PathBuf::from(p.trim());
        if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create database dir")?;
        }
        return Ok(p);
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("messbook.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&conn)?;
    debug!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS members(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        login TEXT NOT NULL UNIQUE,
        deposit TEXT NOT NULL DEFAULT '0',
        dob TEXT,
        mobile TEXT,
        role TEXT NOT NULL DEFAULT 'member' CHECK(role IN ('member','manager')),
        remote_id TEXT UNIQUE,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- paid_by holds a member id or the literal 'admin'
    CREATE TABLE IF NOT EXISTS expenses(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        category TEXT NOT NULL,
        amount TEXT NOT NULL,
        paid_by TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending','approved','rejected')),
        description TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date);

    CREATE TABLE IF NOT EXISTS meals(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        member_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        meal_type TEXT NOT NULL CHECK(meal_type IN ('lunch','dinner')),
        UNIQUE(member_id, date, meal_type),
        FOREIGN KEY(member_id) REFERENCES members(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_meals_date ON meals(date);

    CREATE TABLE IF NOT EXISTS guest_meals(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        host_member_id INTEGER NOT NULL,
        guest_meal_type TEXT NOT NULL CHECK(guest_meal_type IN ('fish','egg','veg','meat')),
        meal_time TEXT NOT NULL CHECK(meal_time IN ('lunch','dinner')),
        quantity INTEGER NOT NULL DEFAULT 1,
        unit_price TEXT NOT NULL,
        FOREIGN KEY(host_member_id) REFERENCES members(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS market_duties(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        member_id INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending','approved','rejected')),
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(member_id) REFERENCES members(id) ON DELETE CASCADE
    );
    -- one live claim per day; rejected rows do not block the date
    CREATE UNIQUE INDEX IF NOT EXISTS idx_market_duties_live
        ON market_duties(date) WHERE status != 'rejected';

    CREATE TABLE IF NOT EXISTS monthly_summaries(
        month TEXT NOT NULL,
        member_id INTEGER NOT NULL,
        deposit_balance TEXT NOT NULL DEFAULT '0',
        submitted_amount TEXT NOT NULL DEFAULT '0',
        closed_at TEXT,
        PRIMARY KEY(month, member_id),
        FOREIGN KEY(member_id) REFERENCES members(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS notifications(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        member_id INTEGER NOT NULL,
        message TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(member_id) REFERENCES members(id) ON DELETE CASCADE
    );
    "#,
    )?;
    Ok(())
}
