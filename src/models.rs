// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::MessError;

/// Literal stored in `expenses.paid_by` when the administrator paid.
pub const ADMIN_PAYER: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Manager => "manager",
        }
    }
}

impl FromStr for Role {
    type Err = MessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "member" => Ok(Role::Member),
            "manager" => Ok(Role::Manager),
            other => Err(MessError::InvalidValue {
                field: "role",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub login: String,
    pub deposit: Decimal,
    pub dob: Option<NaiveDate>,
    pub mobile: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpenseCategory {
    Market,
    Spices,
    Rice,
    Others,
    Gas,
    Wifi,
    Electric,
    Paper,
    Didi,
    HouseRent,
    Deposit,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 11] = [
        ExpenseCategory::Market,
        ExpenseCategory::Spices,
        ExpenseCategory::Rice,
        ExpenseCategory::Others,
        ExpenseCategory::Gas,
        ExpenseCategory::Wifi,
        ExpenseCategory::Electric,
        ExpenseCategory::Paper,
        ExpenseCategory::Didi,
        ExpenseCategory::HouseRent,
        ExpenseCategory::Deposit,
    ];

    /// Bills split evenly across every member.
    pub const SHARED_BILLS: [ExpenseCategory; 8] = [
        ExpenseCategory::Gas,
        ExpenseCategory::Paper,
        ExpenseCategory::Wifi,
        ExpenseCategory::Didi,
        ExpenseCategory::Spices,
        ExpenseCategory::HouseRent,
        ExpenseCategory::Electric,
        ExpenseCategory::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Market => "market",
            ExpenseCategory::Spices => "spices",
            ExpenseCategory::Rice => "rice",
            ExpenseCategory::Others => "others",
            ExpenseCategory::Gas => "gas",
            ExpenseCategory::Wifi => "wifi",
            ExpenseCategory::Electric => "electric",
            ExpenseCategory::Paper => "paper",
            ExpenseCategory::Didi => "didi",
            ExpenseCategory::HouseRent => "houseRent",
            ExpenseCategory::Deposit => "deposit",
        }
    }

    pub fn is_shared_bill(&self) -> bool {
        Self::SHARED_BILLS.contains(self)
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseCategory {
    type Err = MessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        let needle = if needle.eq_ignore_ascii_case("house-rent") {
            "houseRent"
        } else {
            needle
        };
        Self::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(needle))
            .copied()
            .ok_or_else(|| MessError::InvalidValue {
                field: "category",
                value: needle.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "pending",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ExpenseStatus {
    type Err = MessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ExpenseStatus::Pending),
            "approved" => Ok(ExpenseStatus::Approved),
            "rejected" => Ok(ExpenseStatus::Rejected),
            other => Err(MessError::InvalidValue {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Who paid for an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payer {
    Admin,
    Member(i64),
}

impl Payer {
    pub fn to_db(&self) -> String {
        match self {
            Payer::Admin => ADMIN_PAYER.to_string(),
            Payer::Member(id) => id.to_string(),
        }
    }

    pub fn from_db(s: &str) -> Result<Self, MessError> {
        if s == ADMIN_PAYER {
            return Ok(Payer::Admin);
        }
        s.parse::<i64>()
            .map(Payer::Member)
            .map_err(|_| MessError::InvalidValue {
                field: "paid_by",
                value: s.to_string(),
            })
    }

    pub fn member_id(&self) -> Option<i64> {
        match self {
            Payer::Admin => None,
            Payer::Member(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub date: NaiveDate,
    pub category: ExpenseCategory,
    pub amount: Decimal,
    pub paid_by: Payer,
    pub status: ExpenseStatus,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Lunch,
    Dinner,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

impl FromStr for MealType {
    type Err = MessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            other => Err(MessError::InvalidValue {
                field: "meal type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealRecord {
    pub member_id: i64,
    pub date: NaiveDate,
    pub meal_type: MealType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestMealType {
    Fish,
    Egg,
    Veg,
    Meat,
}

impl GuestMealType {
    pub const ALL: [GuestMealType; 4] = [
        GuestMealType::Fish,
        GuestMealType::Egg,
        GuestMealType::Veg,
        GuestMealType::Meat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GuestMealType::Fish => "fish",
            GuestMealType::Egg => "egg",
            GuestMealType::Veg => "veg",
            GuestMealType::Meat => "meat",
        }
    }

    pub fn default_price(&self) -> Decimal {
        match self {
            GuestMealType::Fish => Decimal::from(60),
            GuestMealType::Egg => Decimal::from(40),
            GuestMealType::Veg => Decimal::from(30),
            GuestMealType::Meat => Decimal::from(80),
        }
    }
}

impl FromStr for GuestMealType {
    type Err = MessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fish" => Ok(GuestMealType::Fish),
            "egg" => Ok(GuestMealType::Egg),
            "veg" => Ok(GuestMealType::Veg),
            "meat" => Ok(GuestMealType::Meat),
            other => Err(MessError::InvalidValue {
                field: "guest meal type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestMeal {
    pub id: i64,
    pub date: NaiveDate,
    pub host_member_id: i64,
    pub guest_meal_type: GuestMealType,
    pub meal_time: MealType,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl GuestMeal {
    pub fn cost(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Clear,
    Partial,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Clear => "clear",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub month: String, // YYYY-MM
    pub member_id: i64,
    pub deposit_balance: Decimal,
    pub submitted_amount: Decimal,
    pub received_amount: Decimal,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DutyStatus {
    Pending,
    Approved,
    Rejected,
}

impl DutyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DutyStatus::Pending => "pending",
            DutyStatus::Approved => "approved",
            DutyStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for DutyStatus {
    type Err = MessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(DutyStatus::Pending),
            "approved" => Ok(DutyStatus::Approved),
            "rejected" => Ok(DutyStatus::Rejected),
            other => Err(MessError::InvalidValue {
                field: "duty status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDuty {
    pub id: i64,
    pub date: NaiveDate,
    pub member_id: i64,
    pub status: DutyStatus,
}
