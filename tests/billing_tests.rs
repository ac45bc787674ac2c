// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use messbook::billing::{
    BillingPolicy, MonthInputs, effective_meals, meal_charge, payment_status, per_head_amount,
    reconcile,
};
use messbook::models::{
    Expense, ExpenseCategory, ExpenseStatus, GuestMeal, GuestMealType, MealRecord, MealType,
    Member, Payer, PaymentStatus, Role,
};
use rust_decimal::Decimal;

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn member(id: i64, name: &str, deposit: &str) -> Member {
    Member {
        id,
        name: name.to_string(),
        login: name.to_lowercase(),
        deposit: d(deposit),
        dob: None,
        mobile: None,
        role: Role::Member,
    }
}

fn expense(
    id: i64,
    category: ExpenseCategory,
    amount: &str,
    paid_by: Payer,
    status: ExpenseStatus,
) -> Expense {
    Expense {
        id,
        date: NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
        category,
        amount: d(amount),
        paid_by,
        status,
        description: String::new(),
    }
}

fn meals_for(member_id: i64, days: u32) -> Vec<MealRecord> {
    let mut out = Vec::new();
    for day in 1..=days {
        let date = NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        out.push(MealRecord { member_id, date, meal_type: MealType::Lunch });
        out.push(MealRecord { member_id, date, meal_type: MealType::Dinner });
    }
    out
}

#[test]
fn per_head_splits_shared_bills() {
    assert_eq!(per_head_amount([d("100"), d("50")], 2), d("75"));
}

#[test]
fn per_head_treats_empty_mess_as_one_head() {
    assert_eq!(per_head_amount([d("100"), d("50")], 0), d("150"));
}

#[test]
fn per_head_reconstructs_total() {
    let bills = [d("1000"), d("333.33"), d("17.01")];
    let total: Decimal = bills.iter().sum();
    let tolerance = d("0.0000000001");
    for n in 1..=13usize {
        let share = per_head_amount(bills, n);
        let rebuilt = share * Decimal::from(n as u64);
        assert!((rebuilt - total).abs() < tolerance, "n={} rebuilt={}", n, rebuilt);
    }
}

#[test]
fn meal_charge_subtracts_guest_revenue() {
    assert_eq!(meal_charge(d("1000"), d("200"), d("100"), 50), d("22"));
}

#[test]
fn meal_charge_is_zero_without_billed_meals() {
    assert_eq!(meal_charge(d("1000"), d("200"), d("0"), 0), Decimal::ZERO);
}

#[test]
fn effective_meals_floors_at_minimum() {
    assert_eq!(effective_meals(30, 40), 40);
    assert_eq!(effective_meals(52, 40), 52);
    for actual in 0..100 {
        assert!(effective_meals(actual, 40) >= 40);
    }
}

#[test]
fn payment_status_transitions() {
    assert_eq!(payment_status(d("0"), d("100")), PaymentStatus::Pending);
    assert_eq!(payment_status(d("40"), d("100")), PaymentStatus::Partial);
    assert_eq!(payment_status(d("100"), d("100")), PaymentStatus::Clear);
    assert_eq!(payment_status(d("150"), d("100")), PaymentStatus::Clear);
    // nothing owed is never "clear"
    assert_eq!(payment_status(d("0"), d("0")), PaymentStatus::Pending);
    assert_eq!(payment_status(d("10"), d("-5")), PaymentStatus::Pending);
}

#[test]
fn reconcile_month() {
    let inputs = MonthInputs {
        members: vec![member(1, "Asha", "500"), member(2, "Bilal", "0")],
        expenses: vec![
            expense(1, ExpenseCategory::Market, "1000", Payer::Member(1), ExpenseStatus::Approved),
            expense(2, ExpenseCategory::Rice, "200", Payer::Admin, ExpenseStatus::Approved),
            expense(3, ExpenseCategory::Gas, "100", Payer::Admin, ExpenseStatus::Approved),
            expense(4, ExpenseCategory::Wifi, "50", Payer::Admin, ExpenseStatus::Approved),
            // not yet approved: ignored
            expense(5, ExpenseCategory::Market, "999", Payer::Member(2), ExpenseStatus::Pending),
            expense(6, ExpenseCategory::Electric, "80", Payer::Admin, ExpenseStatus::Rejected),
            // deposits are payments, not costs
            expense(7, ExpenseCategory::Deposit, "500", Payer::Member(1), ExpenseStatus::Approved),
        ],
        meals: [meals_for(1, 30), meals_for(2, 15)].concat(),
        guest_meals: vec![GuestMeal {
            id: 1,
            date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            host_member_id: 2,
            guest_meal_type: GuestMealType::Egg,
            meal_time: MealType::Dinner,
            quantity: 1,
            unit_price: d("40"),
        }],
    };

    let bill = reconcile(&inputs, BillingPolicy { min_meals_per_month: 40 });
    assert_eq!(bill.shared_bills, d("150"));
    assert_eq!(bill.per_head, d("75"));
    assert_eq!(bill.total_market, d("1000"));
    assert_eq!(bill.guest_adjustment, d("40"));
    assert_eq!(bill.total_adjusted_meals, 100);
    assert_eq!(bill.meal_charge, d("11.6"));

    let asha = bill.member(1).unwrap();
    assert_eq!(asha.actual_meals, 60);
    assert_eq!(asha.effective_meals, 60);
    assert_eq!(asha.total, d("771"));
    assert_eq!(asha.market_contribution, d("1000"));
    assert_eq!(asha.balance, d("-729"));
    assert_eq!(asha.owed_before(Decimal::ZERO), Decimal::ZERO);

    let bilal = bill.member(2).unwrap();
    assert_eq!(bilal.actual_meals, 30);
    assert_eq!(bilal.effective_meals, 40);
    assert_eq!(bilal.guest_meal_cost, d("40"));
    assert_eq!(bilal.total, d("579"));
    assert_eq!(bilal.balance, d("579"));
}

#[test]
fn balance_is_zero_when_deposit_covers_total() {
    let inputs = MonthInputs {
        members: vec![member(1, "Asha", "240")],
        expenses: vec![
            expense(1, ExpenseCategory::Wifi, "40", Payer::Admin, ExpenseStatus::Approved),
            expense(2, ExpenseCategory::Market, "200", Payer::Admin, ExpenseStatus::Approved),
        ],
        meals: Vec::new(),
        guest_meals: Vec::new(),
    };
    let bill = reconcile(&inputs, BillingPolicy::default());
    let b = bill.member(1).unwrap();
    assert_eq!(b.effective_meals, 40);
    assert_eq!(b.total, d("240"));
    assert_eq!(b.balance, Decimal::ZERO);

    // the whole 240 arrived this month: owed 240 before it, now clear
    let owed = b.owed_before(d("240"));
    assert_eq!(owed, d("240"));
    assert_eq!(payment_status(d("240"), owed), PaymentStatus::Clear);
    // a deposit carried in from earlier leaves nothing owed this month
    assert_eq!(
        payment_status(Decimal::ZERO, b.owed_before(Decimal::ZERO)),
        PaymentStatus::Pending
    );
}

#[test]
fn owed_before_adds_receipts_back() {
    let inputs = MonthInputs {
        members: vec![member(1, "Asha", "300")],
        expenses: vec![expense(
            1,
            ExpenseCategory::Gas,
            "500",
            Payer::Admin,
            ExpenseStatus::Approved,
        )],
        meals: Vec::new(),
        guest_meals: Vec::new(),
    };
    let bill = reconcile(&inputs, BillingPolicy { min_meals_per_month: 0 });
    let b = bill.member(1).unwrap();
    assert_eq!(b.balance, d("200"));
    assert_eq!(b.owed_before(d("300")), d("500"));
    assert_eq!(
        payment_status(d("300"), b.owed_before(d("300"))),
        PaymentStatus::Partial
    );
}
