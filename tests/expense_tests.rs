// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use messbook::errors::MessError;
use messbook::{
    cli,
    commands::{expenses, members},
    db, ledger,
};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    for (name, login, role) in [
        ("Asha", "asha", "member"),
        ("Bilal", "bilal", "member"),
        ("Mina", "mina", "manager"),
    ] {
        conn.execute(
            "INSERT INTO members(name, login, role) VALUES (?1, ?2, ?3)",
            params![name, login, role],
        )
        .unwrap();
    }
    conn
}

fn run(conn: &Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["messbook"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    match matches.subcommand() {
        Some(("expense", sub)) => expenses::handle(conn, sub),
        Some(("member", sub)) => members::handle(conn, sub),
        _ => unreachable!(),
    }
}

fn status_of(conn: &Connection, id: i64) -> String {
    conn.query_row("SELECT status FROM expenses WHERE id=?1", params![id], |r| r.get(0))
        .unwrap()
}

fn deposit_of(conn: &Connection, name: &str) -> Decimal {
    ledger::member_by_name(conn, name).unwrap().deposit
}

#[test]
fn admin_entries_are_approved_immediately() {
    let conn = setup();
    run(
        &conn,
        &["expense", "add", "--date", "2025-03-02", "--category", "gas", "--amount", "950"],
    )
    .unwrap();
    assert_eq!(status_of(&conn, 1), "approved");
    let paid_by: String = conn
        .query_row("SELECT paid_by FROM expenses WHERE id=1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(paid_by, "admin");
}

#[test]
fn manager_entries_are_approved_immediately() {
    let conn = setup();
    run(
        &conn,
        &[
            "--as", "mina", "expense", "add", "--date", "2025-03-02", "--category", "house-rent",
            "--amount", "12000",
        ],
    )
    .unwrap();
    assert_eq!(status_of(&conn, 1), "approved");
    let category: String = conn
        .query_row("SELECT category FROM expenses WHERE id=1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(category, "houseRent");
}

#[test]
fn member_market_entry_waits_for_approval() {
    let conn = setup();
    run(
        &conn,
        &[
            "--as", "asha", "expense", "add", "--date", "2025-03-03", "--category", "market",
            "--amount", " 420.50 ",
        ],
    )
    .unwrap();
    assert_eq!(status_of(&conn, 1), "pending");
    let asha = ledger::member_by_name(&conn, "asha").unwrap();
    let e = ledger::expense_by_id(&conn, 1).unwrap();
    assert_eq!(e.paid_by.member_id(), Some(asha.id));
    assert_eq!(e.amount, "420.50".parse::<Decimal>().unwrap());
}

#[test]
fn member_cannot_enter_shared_bills() {
    let conn = setup();
    let err = run(
        &conn,
        &[
            "--as", "asha", "expense", "add", "--date", "2025-03-03", "--category", "wifi",
            "--amount", "800",
        ],
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MessError>(),
        Some(MessError::CategoryNotAllowed(_))
    ));
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM expenses", [], |r| r.get(0)).unwrap();
    assert_eq!(n, 0);
}

#[test]
fn member_cannot_record_for_someone_else() {
    let conn = setup();
    let err = run(
        &conn,
        &[
            "--as", "asha", "expense", "add", "--date", "2025-03-03", "--category", "market",
            "--amount", "50", "--paid-by", "bilal",
        ],
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MessError>(),
        Some(MessError::PermissionDenied(_))
    ));
}

#[test]
fn non_positive_amount_is_rejected() {
    let conn = setup();
    assert!(run(
        &conn,
        &["expense", "add", "--date", "2025-03-02", "--category", "gas", "--amount", "0"]
    )
    .is_err());
    assert!(run(
        &conn,
        &["expense", "add", "--date", "2025-03-02", "--category", "gas", "--amount", "abc"]
    )
    .is_err());
    assert!(run(
        &conn,
        &["expense", "add", "--date", "2025-03-02", "--category", "toys", "--amount", "5"]
    )
    .is_err());
}

#[test]
fn approving_a_deposit_credits_the_member() {
    let conn = setup();
    run(
        &conn,
        &[
            "--as", "asha", "member", "deposit", "--name", "asha", "--amount", "2000", "--date",
            "2025-03-01",
        ],
    )
    .unwrap();
    assert_eq!(status_of(&conn, 1), "pending");
    assert_eq!(deposit_of(&conn, "asha"), Decimal::ZERO);

    // a plain member cannot approve
    let err = run(&conn, &["--as", "bilal", "expense", "approve", "--id", "1"]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MessError>(),
        Some(MessError::PermissionDenied(_))
    ));

    run(&conn, &["--as", "mina", "expense", "approve", "--id", "1"]).unwrap();
    assert_eq!(status_of(&conn, 1), "approved");
    assert_eq!(deposit_of(&conn, "asha"), Decimal::from(2000));

    let n: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM notifications WHERE message LIKE '%approved%'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(n, 1);

    let err = run(&conn, &["expense", "reject", "--id", "1"]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MessError>(),
        Some(MessError::AlreadyDecided { .. })
    ));
}

#[test]
fn rejected_deposit_leaves_balance_alone() {
    let conn = setup();
    run(
        &conn,
        &[
            "--as", "asha", "member", "deposit", "--name", "asha", "--amount", "500", "--date",
            "2025-03-01",
        ],
    )
    .unwrap();
    run(&conn, &["expense", "reject", "--id", "1"]).unwrap();
    assert_eq!(status_of(&conn, 1), "rejected");
    assert_eq!(deposit_of(&conn, "asha"), Decimal::ZERO);
}

#[test]
fn removing_an_approved_deposit_debits_the_member() {
    let conn = setup();
    run(
        &conn,
        &["member", "deposit", "--name", "bilal", "--amount", "750", "--date", "2025-03-01"],
    )
    .unwrap();
    assert_eq!(status_of(&conn, 1), "approved");
    assert_eq!(deposit_of(&conn, "bilal"), Decimal::from(750));

    run(&conn, &["expense", "rm", "--id", "1"]).unwrap();
    assert_eq!(deposit_of(&conn, "bilal"), Decimal::ZERO);
    let err = run(&conn, &["expense", "approve", "--id", "1"]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MessError>(),
        Some(MessError::NotFound { .. })
    ));
}

#[test]
fn admin_deposit_needs_a_member() {
    let conn = setup();
    let err = run(
        &conn,
        &["expense", "add", "--date", "2025-03-02", "--category", "deposit", "--amount", "100"],
    )
    .unwrap_err();
    assert!(err.to_string().contains("deposit"));
}

#[test]
fn list_filters_by_month_and_status() {
    let conn = setup();
    run(
        &conn,
        &["expense", "add", "--date", "2025-03-02", "--category", "rice", "--amount", "1500"],
    )
    .unwrap();
    run(
        &conn,
        &["expense", "add", "--date", "2025-04-02", "--category", "rice", "--amount", "1600"],
    )
    .unwrap();
    run(
        &conn,
        &[
            "--as", "bilal", "expense", "add", "--date", "2025-03-09", "--category", "market",
            "--amount", "300",
        ],
    )
    .unwrap();

    let m = cli::build_cli().get_matches_from([
        "messbook", "expense", "list", "--month", "2025-03", "--status", "pending",
    ]);
    let (_, sub) = m.subcommand().unwrap();
    let (_, list) = sub.subcommand().unwrap();
    let rows = expenses::query_rows(&conn, list).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].paid_by, "Bilal");
    assert_eq!(rows[0].amount, "300.00");
}

#[test]
fn member_management_is_admin_only() {
    let conn = setup();
    let err = run(
        &conn,
        &["--as", "mina", "member", "add", "--name", "Rafi", "--login", "rafi"],
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MessError>(),
        Some(MessError::PermissionDenied(_))
    ));

    run(
        &conn,
        &[
            "member", "add", "--name", " Rafi ", "--login", "rafi", "--mobile", "+880 1711-000000",
            "--deposit", "300",
        ],
    )
    .unwrap();
    let rafi = ledger::member_by_name(&conn, "Rafi").unwrap();
    assert_eq!(rafi.deposit, Decimal::from(300));
    assert_eq!(rafi.mobile.as_deref(), Some("+880 1711-000000"));

    // duplicate login
    assert!(run(&conn, &["member", "add", "--name", "Rafiq", "--login", "rafi"]).is_err());
    assert!(run(
        &conn,
        &["member", "add", "--name", "Tia", "--login", "tia", "--mobile", "call me"]
    )
    .is_err());

    run(&conn, &["member", "adjust", "--name", "rafi", "--amount", "-50"]).unwrap();
    assert_eq!(deposit_of(&conn, "rafi"), Decimal::from(250));
}
