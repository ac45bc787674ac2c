// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Rule violations raised by the ledger. Command handlers wrap these in
/// `anyhow::Error`; tests downcast to match on the variant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessError {
    #[error("Member '{0}' not found")]
    UnknownMember(String),

    #[error("Invalid {field} '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("{member} already has a {meal} entry on {date}")]
    DuplicateMeal {
        member: String,
        date: String,
        meal: String,
    },

    #[error("{member} has already used {quota} market duty requests in {month}")]
    DutyQuotaExceeded {
        member: String,
        month: String,
        quota: u32,
    },

    #[error("{date} is already claimed for market duty")]
    DutyDateTaken { date: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Members may only record market or deposit expenses, not '{0}'")]
    CategoryNotAllowed(String),

    #[error("{kind} #{id} is already {status}")]
    AlreadyDecided {
        kind: &'static str,
        id: i64,
        status: String,
    },

    #[error("{kind} #{id} not found")]
    NotFound { kind: &'static str, id: i64 },
}
