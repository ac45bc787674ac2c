// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use messbook::api::{Slice, SliceSet};
use messbook::models::GuestMealType;
use messbook::{cli, commands::settings, config, db};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn.execute("INSERT INTO members(name, login) VALUES ('Asha', 'asha')", [])
        .unwrap();
    conn
}

#[test]
fn defaults_apply_until_set() {
    let conn = setup();
    assert_eq!(config::min_meals_per_month(&conn).unwrap(), 40);
    assert_eq!(config::duty_quota(&conn).unwrap(), 4);
    assert_eq!(config::currency(&conn).unwrap(), "BDT");
    assert_eq!(config::guest_price(&conn, GuestMealType::Veg).unwrap(), Decimal::from(30));
    assert_eq!(config::api_base_url(&conn).unwrap(), None);
}

#[test]
fn set_checked_validates_values() {
    let conn = setup();
    config::set_checked(&conn, "min_meals_per_month", " 45 ").unwrap();
    assert_eq!(config::billing_policy(&conn).unwrap().min_meals_per_month, 45);
    config::set_checked(&conn, "guest_price_egg", "35.5").unwrap();
    assert_eq!(
        config::guest_price(&conn, GuestMealType::Egg).unwrap(),
        "35.5".parse::<Decimal>().unwrap()
    );
    config::set_checked(&conn, "api_base_url", "https://mess.example.org/api/").unwrap();
    assert_eq!(
        config::api_base_url(&conn).unwrap().as_deref(),
        Some("https://mess.example.org/api")
    );

    assert!(config::set_checked(&conn, "duty_quota", "four").is_err());
    assert!(config::set_checked(&conn, "guest_price_fish", "-1").is_err());
    assert!(config::set_checked(&conn, "api_base_url", "mess.example.org").is_err());
    assert!(config::set_checked(&conn, "currency", "  ").is_err());
    let err = config::set_checked(&conn, "base_currency", "USD").unwrap_err();
    assert!(err.to_string().contains("Unknown setting"));
    assert_eq!(config::duty_quota(&conn).unwrap(), 4);
}

#[test]
fn settings_are_admin_only() {
    let conn = setup();
    let m = cli::build_cli().get_matches_from([
        "messbook", "--as", "asha", "settings", "set", "--key", "currency", "--value", "INR",
    ]);
    let (_, sub) = m.subcommand().unwrap();
    assert!(settings::handle(&conn, sub).is_err());

    let m = cli::build_cli().get_matches_from([
        "messbook", "settings", "set", "--key", "currency", "--value", "INR",
    ]);
    let (_, sub) = m.subcommand().unwrap();
    settings::handle(&conn, sub).unwrap();
    assert_eq!(config::currency(&conn).unwrap(), "INR");
}

#[test]
fn effective_settings_hide_the_token() {
    let conn = setup();
    config::set_setting(&conn, config::API_TOKEN_KEY, "s3cret").unwrap();
    let all = config::effective_settings(&conn).unwrap();
    let token = all.iter().find(|(k, _)| k == "api_token").unwrap();
    assert_eq!(token.1, "(set)");
    assert!(all.iter().any(|(k, v)| k == "guest_price_meat" && v == "80"));
}

#[test]
fn stale_slices_persist_as_a_list() {
    let conn = setup();
    config::mark_stale(&conn, Slice::Market).unwrap();
    config::mark_stale(&conn, Slice::Expenses).unwrap();
    config::mark_stale(&conn, Slice::Market).unwrap();
    assert_eq!(
        config::get_setting(&conn, config::STALE_SLICES_KEY).unwrap().as_deref(),
        Some("expenses,market")
    );

    config::clear_stale(&conn, [Slice::Expenses, Slice::Meals]).unwrap();
    assert_eq!(config::stale_slices(&conn).unwrap(), SliceSet::only([Slice::Market]));

    // not a user-facing setting
    assert!(config::set_checked(&conn, config::STALE_SLICES_KEY, "meals").is_err());
    config::set_setting(&conn, config::STALE_SLICES_KEY, "meals,accounts").unwrap();
    assert!(config::stale_slices(&conn).is_err());
}
