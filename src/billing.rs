// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Monthly reconciliation of a mess: shared bills are split per head, food
//! spend is charged per meal with a minimum billed meal count, and every
//! member's dues are netted against their deposit and market purchases.
//!
//! Everything here is a pure function of already-loaded snapshots.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{
    Expense, ExpenseCategory, ExpenseStatus, GuestMeal, MealRecord, Member, PaymentStatus,
};

pub const DEFAULT_MIN_MEALS_PER_MONTH: u32 = 40;

#[derive(Debug, Clone, Copy)]
pub struct BillingPolicy {
    pub min_meals_per_month: u32,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            min_meals_per_month: DEFAULT_MIN_MEALS_PER_MONTH,
        }
    }
}

/// Snapshot of one month's ledger.
#[derive(Debug, Clone, Default)]
pub struct MonthInputs {
    pub members: Vec<Member>,
    pub expenses: Vec<Expense>,
    pub meals: Vec<MealRecord>,
    pub guest_meals: Vec<GuestMeal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberBill {
    pub member_id: i64,
    pub name: String,
    pub actual_meals: u32,
    pub effective_meals: u32,
    pub meal_cost: Decimal,
    pub per_head: Decimal,
    pub guest_meal_cost: Decimal,
    pub total: Decimal,
    pub deposit: Decimal,
    pub market_contribution: Decimal,
    pub balance: Decimal,
}

impl MemberBill {
    /// What the member owed before `received` came in. Approved deposits are
    /// already netted into `balance`, so payment status is measured against
    /// this amount rather than the balance. Zero when the mess owes them.
    pub fn owed_before(&self, received: Decimal) -> Decimal {
        (self.balance + received).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyBill {
    pub shared_bills: Decimal,
    pub per_head: Decimal,
    pub total_market: Decimal,
    pub total_rice: Decimal,
    pub guest_adjustment: Decimal,
    pub total_adjusted_meals: u32,
    pub meal_charge: Decimal,
    pub members: Vec<MemberBill>,
}

impl MonthlyBill {
    pub fn member(&self, member_id: i64) -> Option<&MemberBill> {
        self.members.iter().find(|b| b.member_id == member_id)
    }
}

/// Splits the shared bills evenly. A mess with no members is billed as one head.
pub fn per_head_amount<I>(bills: I, member_count: usize) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    let total: Decimal = bills.into_iter().sum();
    let heads = Decimal::from(member_count.max(1) as u64);
    total / heads
}

pub fn effective_meals(actual_meals: u32, min_meals: u32) -> u32 {
    actual_meals.max(min_meals)
}

/// Food cost per billed meal; zero when nobody is billed for any meal.
pub fn meal_charge(
    total_market: Decimal,
    total_rice: Decimal,
    guest_adjustment: Decimal,
    total_adjusted_meals: u32,
) -> Decimal {
    if total_adjusted_meals == 0 {
        return Decimal::ZERO;
    }
    (total_market + total_rice - guest_adjustment) / Decimal::from(total_adjusted_meals)
}

pub fn payment_status(received: Decimal, balance: Decimal) -> PaymentStatus {
    if balance > Decimal::ZERO && received >= balance {
        PaymentStatus::Clear
    } else if received > Decimal::ZERO && received < balance {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}

fn approved(expenses: &[Expense]) -> impl Iterator<Item = &Expense> {
    expenses
        .iter()
        .filter(|e| e.status == ExpenseStatus::Approved)
}

fn category_total(expenses: &[Expense], category: ExpenseCategory) -> Decimal {
    approved(expenses)
        .filter(|e| e.category == category)
        .map(|e| e.amount)
        .sum()
}

pub fn reconcile(inputs: &MonthInputs, policy: BillingPolicy) -> MonthlyBill {
    let shared_bills: Decimal = approved(&inputs.expenses)
        .filter(|e| e.category.is_shared_bill())
        .map(|e| e.amount)
        .sum();
    let per_head = per_head_amount([shared_bills], inputs.members.len());

    let total_market = category_total(&inputs.expenses, ExpenseCategory::Market);
    let total_rice = category_total(&inputs.expenses, ExpenseCategory::Rice);

    let mut guest_cost: HashMap<i64, Decimal> = HashMap::new();
    for g in &inputs.guest_meals {
        *guest_cost.entry(g.host_member_id).or_default() += g.cost();
    }
    let guest_adjustment: Decimal = guest_cost.values().copied().sum();

    let mut meal_counts: HashMap<i64, u32> = HashMap::new();
    for m in &inputs.meals {
        *meal_counts.entry(m.member_id).or_default() += 1;
    }

    let mut market_by_member: HashMap<i64, Decimal> = HashMap::new();
    for e in approved(&inputs.expenses).filter(|e| e.category == ExpenseCategory::Market) {
        if let Some(id) = e.paid_by.member_id() {
            *market_by_member.entry(id).or_default() += e.amount;
        }
    }

    let counted: Vec<(&Member, u32, u32)> = inputs
        .members
        .iter()
        .map(|m| {
            let actual = meal_counts.get(&m.id).copied().unwrap_or(0);
            (m, actual, effective_meals(actual, policy.min_meals_per_month))
        })
        .collect();
    let total_adjusted_meals: u32 = counted.iter().map(|(_, _, eff)| *eff).sum();
    let charge = meal_charge(total_market, total_rice, guest_adjustment, total_adjusted_meals);

    let members = counted
        .into_iter()
        .map(|(m, actual, eff)| {
            let meal_cost = Decimal::from(eff) * charge;
            let guest_meal_cost = guest_cost.get(&m.id).copied().unwrap_or_default();
            let market_contribution = market_by_member.get(&m.id).copied().unwrap_or_default();
            let total = meal_cost + per_head + guest_meal_cost;
            MemberBill {
                member_id: m.id,
                name: m.name.clone(),
                actual_meals: actual,
                effective_meals: eff,
                meal_cost,
                per_head,
                guest_meal_cost,
                total,
                deposit: m.deposit,
                market_contribution,
                balance: total - (m.deposit + market_contribution),
            }
        })
        .collect();

    MonthlyBill {
        shared_bills,
        per_head,
        total_market,
        total_rice,
        guest_adjustment,
        total_adjusted_meals,
        meal_charge: charge,
        members,
    }
}
