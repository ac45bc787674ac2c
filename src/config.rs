// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Settings persisted in the `settings` table, with typed accessors.

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

use crate::api::{Slice, SliceSet};
use crate::billing::{BillingPolicy, DEFAULT_MIN_MEALS_PER_MONTH};
use crate::models::GuestMealType;

pub const MIN_MEALS_KEY: &str = "min_meals_per_month";
pub const DUTY_QUOTA_KEY: &str = "duty_quota";
pub const CURRENCY_KEY: &str = "currency";
pub const API_BASE_URL_KEY: &str = "api_base_url";
pub const API_TOKEN_KEY: &str = "api_token";
/// Internal: slices written locally since their last pull.
pub const STALE_SLICES_KEY: &str = "stale_slices";

/// Overrides the stored API token when set.
pub const API_TOKEN_ENV: &str = "MESSBOOK_API_TOKEN";

pub const DEFAULT_DUTY_QUOTA: u32 = 4;
pub const DEFAULT_CURRENCY: &str = "BDT";

pub fn guest_price_key(t: GuestMealType) -> String {
    format!("guest_price_{}", t.as_str())
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn get_u32(conn: &Connection, key: &str, default: u32) -> Result<u32> {
    match get_setting(conn, key)? {
        Some(s) => s
            .trim()
            .parse::<u32>()
            .with_context(|| format!("Invalid value '{}' for setting {}", s, key)),
        None => Ok(default),
    }
}

pub fn min_meals_per_month(conn: &Connection) -> Result<u32> {
    get_u32(conn, MIN_MEALS_KEY, DEFAULT_MIN_MEALS_PER_MONTH)
}

pub fn duty_quota(conn: &Connection) -> Result<u32> {
    get_u32(conn, DUTY_QUOTA_KEY, DEFAULT_DUTY_QUOTA)
}

pub fn currency(conn: &Connection) -> Result<String> {
    Ok(get_setting(conn, CURRENCY_KEY)?.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()))
}

pub fn guest_price(conn: &Connection, t: GuestMealType) -> Result<Decimal> {
    let key = guest_price_key(t);
    match get_setting(conn, &key)? {
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .with_context(|| format!("Invalid value '{}' for setting {}", s, key)),
        None => Ok(t.default_price()),
    }
}

pub fn billing_policy(conn: &Connection) -> Result<BillingPolicy> {
    Ok(BillingPolicy {
        min_meals_per_month: min_meals_per_month(conn)?,
    })
}

pub fn api_base_url(conn: &Connection) -> Result<Option<String>> {
    Ok(get_setting(conn, API_BASE_URL_KEY)?.map(|s| s.trim_end_matches('/').to_string()))
}

pub fn api_token(conn: &Connection) -> Result<Option<String>> {
    if let Ok(t) = std::env::var(API_TOKEN_ENV) {
        if !t.trim().is_empty() {
            return Ok(Some(t.trim().to_string()));
        }
    }
    get_setting(conn, API_TOKEN_KEY)
}

pub fn stale_slices(conn: &Connection) -> Result<SliceSet> {
    match get_setting(conn, STALE_SLICES_KEY)? {
        Some(s) => s
            .parse::<SliceSet>()
            .with_context(|| format!("Invalid value '{}' for setting {}", s, STALE_SLICES_KEY)),
        None => Ok(SliceSet::default()),
    }
}

pub fn mark_stale(conn: &Connection, slice: Slice) -> Result<()> {
    let mut stale = stale_slices(conn)?;
    if stale.contains(slice) {
        return Ok(());
    }
    stale.invalidate(slice);
    set_setting(conn, STALE_SLICES_KEY, &stale.to_string())
}

pub fn clear_stale<I: IntoIterator<Item = Slice>>(conn: &Connection, slices: I) -> Result<()> {
    let mut stale = stale_slices(conn)?;
    let mut changed = false;
    for slice in slices {
        changed |= stale.refreshed(slice);
    }
    if changed {
        set_setting(conn, STALE_SLICES_KEY, &stale.to_string())?;
    }
    Ok(())
}

/// Validates `value` for a known key before storing it.
pub fn set_checked(conn: &Connection, key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    match key {
        MIN_MEALS_KEY | DUTY_QUOTA_KEY => {
            value
                .parse::<u32>()
                .with_context(|| format!("{} expects a whole number, got '{}'", key, value))?;
        }
        CURRENCY_KEY => {
            if value.is_empty() {
                return Err(anyhow!("{} cannot be empty", key));
            }
        }
        API_BASE_URL_KEY => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(anyhow!("{} must start with http:// or https://", key));
            }
        }
        API_TOKEN_KEY => {}
        k if GuestMealType::ALL.iter().any(|t| guest_price_key(*t) == k) => {
            let price = value
                .parse::<Decimal>()
                .with_context(|| format!("{} expects an amount, got '{}'", key, value))?;
            if price.is_sign_negative() {
                return Err(anyhow!("{} cannot be negative", key));
            }
        }
        other => return Err(anyhow!("Unknown setting '{}'", other)),
    }
    set_setting(conn, key, value)
}

/// Every known key with its effective value (defaults included).
pub fn effective_settings(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut out = vec![
        (MIN_MEALS_KEY.to_string(), min_meals_per_month(conn)?.to_string()),
        (DUTY_QUOTA_KEY.to_string(), duty_quota(conn)?.to_string()),
        (CURRENCY_KEY.to_string(), currency(conn)?),
    ];
    for t in GuestMealType::ALL {
        out.push((guest_price_key(t), guest_price(conn, t)?.to_string()));
    }
    out.push((
        API_BASE_URL_KEY.to_string(),
        api_base_url(conn)?.unwrap_or_default(),
    ));
    let token = get_setting(conn, API_TOKEN_KEY)?
        .map(|_| "(set)".to_string())
        .unwrap_or_default();
    out.push((API_TOKEN_KEY.to_string(), token));
    Ok(out)
}
