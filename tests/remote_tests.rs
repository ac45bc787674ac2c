// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use messbook::api::{self, ApiClient, Slice, SliceSet, Snapshot};
use messbook::commands::expenses::{NewExpense, record_expense};
use messbook::commands::{duty, meals};
use messbook::ledger::Actor;
use messbook::models::{ExpenseCategory, ExpenseStatus, MealType, Payer, Role};
use messbook::{cli, commands::remote, config, db, ledger};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde_json::json;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO members(name, login, deposit)
            VALUES ('Asha', 'asha', '10'), ('Bilal', 'bilal', '0');
        INSERT INTO expenses(date, category, amount, paid_by, status)
            VALUES ('2025-02-01', 'gas', '99', 'admin', 'approved');
        INSERT INTO meals(member_id, date, meal_type) VALUES (1, '2025-02-01', 'lunch');
        "#,
    )
    .unwrap();
    conn
}

fn snapshot() -> Snapshot {
    Snapshot {
        members: Some(
            serde_json::from_value(json!([
                { "_id": "u1", "name": "Asha", "username": "asha", "deposit": "250.5" },
                {
                    "_id": "u2", "name": "Rafi", "login": "rafi", "deposit": 100,
                    "role": "manager", "mobileNumber": "01711000000"
                }
            ]))
            .unwrap(),
        ),
        expenses: Some(
            serde_json::from_value(json!([
                {
                    "_id": "e1", "date": "2025-03-02T00:00:00.000Z", "category": "market",
                    "amount": 300, "paidBy": "u1", "status": "pending"
                },
                {
                    "_id": "e2", "date": "2025-03-01", "category": "houseRent",
                    "amount": "5000", "paidBy": "admin"
                },
                {
                    "_id": "e3", "date": "2025-03-03", "category": "market",
                    "amount": 10, "paidBy": "ghost"
                },
                {
                    "_id": "e4", "date": "2025-03-03", "category": "toys",
                    "amount": 10, "paidBy": "admin"
                }
            ]))
            .unwrap(),
        ),
        meals: Some(
            serde_json::from_value(json!([
                { "memberId": "u1", "date": "2025-03-02", "mealType": "lunch" },
                { "memberId": "u1", "date": "2025-03-02", "mealType": "lunch" },
                { "memberId": "u2", "date": "2025-03-02", "mealType": "brunch" }
            ]))
            .unwrap(),
        ),
        guest_meals: Some(
            serde_json::from_value(json!([
                {
                    "date": "2025-03-04", "hostMemberId": "u2",
                    "guestMealType": "fish", "mealTime": "lunch"
                }
            ]))
            .unwrap(),
        ),
        market: Some(
            serde_json::from_value(json!([
                { "date": "2025-03-10", "assignedMemberId": "u2", "status": "approved" },
                { "date": "2025-03-10", "assignedMemberId": "u1" }
            ]))
            .unwrap(),
        ),
        failures: Vec::new(),
    }
}

#[test]
fn slices_parse_and_collect() {
    assert_eq!("guest-meals".parse::<Slice>().unwrap(), Slice::GuestMeals);
    assert!("accounts".parse::<Slice>().is_err());

    let mut set = SliceSet::default();
    assert!(set.is_empty());
    set.invalidate(Slice::Meals);
    set.invalidate(Slice::Meals);
    set.invalidate(Slice::Members);
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![Slice::Members, Slice::Meals]);
    assert_eq!(set, SliceSet::only([Slice::Meals, Slice::Members]));
    assert!(SliceSet::all().contains(Slice::Market));
}

#[test]
fn only_flag_accepts_comma_lists() {
    let m = cli::build_cli().get_matches_from([
        "messbook", "remote", "pull", "--only", "members,meals", "--only", "market",
    ]);
    let (_, remote) = m.subcommand().unwrap();
    let (_, pull) = remote.subcommand().unwrap();
    let only: Vec<&String> = pull.get_many::<String>("only").unwrap().collect();
    assert_eq!(only, vec!["members", "meals", "market"]);
}

#[test]
fn unreachable_backend_reports_every_slice() {
    let client = ApiClient::new("http://127.0.0.1:9/", None).unwrap();
    let snap = api::fetch_snapshot(&client, &SliceSet::only([Slice::Members, Slice::Meals]));
    assert!(snap.fetched().is_empty());
    let failed: Vec<Slice> = snap.failures.iter().map(|(s, _)| *s).collect();
    assert_eq!(failed, vec![Slice::Members, Slice::Meals]);

    // a failed refresh leaves local data untouched
    let mut conn = setup();
    let report = remote::apply_snapshot(&mut conn, &snap).unwrap();
    assert!(report.is_empty());
    assert_eq!(ledger::load_members(&conn).unwrap().len(), 2);
}

#[test]
fn apply_snapshot_maps_remote_ids() {
    let mut conn = setup();
    let report = remote::apply_snapshot(&mut conn, &snapshot()).unwrap();
    assert_eq!(
        report,
        vec![
            (Slice::Members, 2, 0),
            (Slice::Expenses, 2, 2),
            (Slice::Meals, 1, 1),
            (Slice::GuestMeals, 1, 0),
            (Slice::Market, 1, 1),
        ]
    );

    let members = ledger::load_members(&conn).unwrap();
    assert_eq!(members.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(), vec!["Asha", "Rafi"]);
    let asha = ledger::member_by_name(&conn, "asha").unwrap();
    assert_eq!(asha.deposit, "250.5".parse::<Decimal>().unwrap());
    let rafi = ledger::member_by_name(&conn, "rafi").unwrap();
    assert_eq!(rafi.role, Role::Manager);
    assert_eq!(rafi.mobile.as_deref(), Some("01711000000"));

    let expenses = ledger::load_expenses(&conn, None).unwrap();
    assert_eq!(expenses.len(), 2);
    let market = expenses.iter().find(|e| e.amount == Decimal::from(300)).unwrap();
    assert_eq!(market.paid_by, Payer::Member(asha.id));
    assert_eq!(market.status, ExpenseStatus::Pending);
    assert_eq!(market.date.to_string(), "2025-03-02");
    let rent = expenses.iter().find(|e| e.paid_by == Payer::Admin).unwrap();
    assert_eq!(rent.status, ExpenseStatus::Approved);

    let guests = ledger::load_guest_meals(&conn, None).unwrap();
    assert_eq!(guests[0].host_member_id, rafi.id);
    assert_eq!(guests[0].unit_price, Decimal::from(60));
    assert_eq!(guests[0].quantity, 1);

    let duties = ledger::load_duties(&conn, None).unwrap();
    assert_eq!(duties.len(), 1);
    assert_eq!(duties[0].member_id, rafi.id);

    // a second pull is stable
    let report = remote::apply_snapshot(&mut conn, &snapshot()).unwrap();
    assert_eq!(report[0], (Slice::Members, 2, 0));
    assert_eq!(ledger::load_members(&conn).unwrap().len(), 2);
}

#[test]
fn partial_snapshot_touches_only_fetched_slices() {
    let mut conn = setup();
    let mut snap = snapshot();
    snap.members = None;
    snap.expenses = None;
    snap.guest_meals = None;
    snap.market = None;
    // no member carries a remote id yet, so every meal is skipped
    let report = remote::apply_snapshot(&mut conn, &snap).unwrap();
    assert_eq!(report, vec![(Slice::Meals, 0, 3)]);
    assert_eq!(ledger::load_expenses(&conn, None).unwrap().len(), 1);
    assert_eq!(ledger::load_members(&conn).unwrap().len(), 2);
}

#[test]
fn pull_needs_admin_and_backend() {
    let mut conn = setup();
    let m = cli::build_cli().get_matches_from(["messbook", "--as", "asha", "remote", "pull"]);
    let (_, sub) = m.subcommand().unwrap();
    assert!(remote::handle(&mut conn, sub).is_err());

    let m = cli::build_cli().get_matches_from(["messbook", "remote", "pull"]);
    let (_, sub) = m.subcommand().unwrap();
    let err = remote::handle(&mut conn, sub).unwrap_err();
    assert!(err.to_string().contains("No backend configured"));
}

#[test]
fn failed_member_update_keeps_local_row() {
    let mut conn = setup();
    // u1 tries to take Bilal's name while still owning Asha's login
    let snap = Snapshot {
        members: Some(
            serde_json::from_value(json!([
                { "_id": "u1", "name": "Bilal", "login": "asha" },
                { "_id": "u2", "name": "Bilal Khan", "login": "bilal" }
            ]))
            .unwrap(),
        ),
        expenses: None,
        meals: None,
        guest_meals: None,
        market: None,
        failures: Vec::new(),
    };
    let report = remote::apply_snapshot(&mut conn, &snap).unwrap();
    assert_eq!(report, vec![(Slice::Members, 1, 1)]);

    let logins: Vec<String> = ledger::load_members(&conn)
        .unwrap()
        .into_iter()
        .map(|m| m.login)
        .collect();
    assert_eq!(logins, vec!["asha", "bilal"]);
    let asha = ledger::member_by_name(&conn, "asha").unwrap();
    assert_eq!(asha.name, "Asha");
    let meals: i64 = conn
        .query_row("SELECT COUNT(*) FROM meals WHERE member_id=?1", [asha.id], |r| r.get(0))
        .unwrap();
    assert_eq!(meals, 1);
}

#[test]
fn local_writes_mark_slices_stale() {
    let mut conn = setup();
    assert!(config::stale_slices(&conn).unwrap().is_empty());

    let asha = ledger::member_by_name(&conn, "asha").unwrap();
    let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
    meals::add_meals(&conn, &asha, date, &[MealType::Dinner]).unwrap();
    duty::assign(&conn, &Actor::Admin, &asha, date).unwrap();
    assert_eq!(
        config::stale_slices(&conn).unwrap(),
        SliceSet::only([Slice::Meals, Slice::Market])
    );

    // an approved deposit also moves the member's running deposit
    let deposit = NewExpense {
        date,
        category: ExpenseCategory::Deposit,
        amount: Decimal::from(50),
        paid_by: Some(Payer::Member(asha.id)),
        description: String::new(),
    };
    record_expense(&conn, &Actor::Admin, deposit).unwrap();
    let stale = config::stale_slices(&conn).unwrap();
    assert!(stale.contains(Slice::Expenses));
    assert!(stale.contains(Slice::Members));

    // applying a slice clears only that slice
    let mut snap = snapshot();
    snap.members = None;
    snap.expenses = None;
    snap.guest_meals = None;
    snap.market = None;
    remote::apply_snapshot(&mut conn, &snap).unwrap();
    assert_eq!(
        config::stale_slices(&conn).unwrap(),
        SliceSet::only([Slice::Members, Slice::Expenses, Slice::Market])
    );
    remote::apply_snapshot(&mut conn, &snapshot()).unwrap();
    assert!(config::stale_slices(&conn).unwrap().is_empty());
}

#[test]
fn failed_fetch_keeps_slices_stale() {
    let mut conn = setup();
    config::mark_stale(&conn, Slice::Meals).unwrap();
    let client = ApiClient::new("http://127.0.0.1:9/", None).unwrap();
    let snap = api::fetch_snapshot(&client, &config::stale_slices(&conn).unwrap());
    remote::apply_snapshot(&mut conn, &snap).unwrap();
    assert_eq!(config::stale_slices(&conn).unwrap(), SliceSet::only([Slice::Meals]));
}

#[test]
fn stale_pull_with_nothing_stale_is_a_no_op() {
    let mut conn = setup();
    // no backend configured, yet nothing needs fetching
    let m = cli::build_cli().get_matches_from(["messbook", "remote", "pull", "--stale"]);
    let (_, sub) = m.subcommand().unwrap();
    remote::handle(&mut conn, sub).unwrap();

    let res = cli::build_cli().try_get_matches_from([
        "messbook", "remote", "pull", "--stale", "--only", "meals",
    ]);
    assert!(res.is_err());
}
