// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Blocking client for the mess backend's JSON API.
//!
//! Collections are fetched one slice at a time. A slice that fails is
//! reported and skipped; the others are still returned.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utils::http_client;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slice {
    Members,
    Expenses,
    Meals,
    GuestMeals,
    Market,
}

impl Slice {
    pub const ALL: [Slice; 5] = [
        Slice::Members,
        Slice::Expenses,
        Slice::Meals,
        Slice::GuestMeals,
        Slice::Market,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slice::Members => "members",
            Slice::Expenses => "expenses",
            Slice::Meals => "meals",
            Slice::GuestMeals => "guest-meals",
            Slice::Market => "market",
        }
    }

    pub fn path(&self) -> String {
        format!("/{}", self.as_str())
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Slice::ALL
            .into_iter()
            .find(|x| x.as_str() == s.trim())
            .ok_or_else(|| anyhow!("Unknown slice '{}'", s))
    }
}

/// A set of slices. Local writes mark the slices they touch as stale and a
/// successful pull clears whatever it applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceSet(BTreeSet<Slice>);

impl SliceSet {
    pub fn all() -> Self {
        Self(Slice::ALL.into_iter().collect())
    }

    pub fn only<I: IntoIterator<Item = Slice>>(slices: I) -> Self {
        Self(slices.into_iter().collect())
    }

    pub fn invalidate(&mut self, slice: Slice) {
        self.0.insert(slice);
    }

    /// Returns true when `slice` was in the set.
    pub fn refreshed(&mut self, slice: Slice) -> bool {
        self.0.remove(&slice)
    }

    pub fn contains(&self, slice: Slice) -> bool {
        self.0.contains(&slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Slice> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for SliceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|s| s.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for SliceSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut set = SliceSet::default();
        for name in s.split(',').filter(|n| !n.trim().is_empty()) {
            set.invalidate(name.parse()?);
        }
        Ok(set)
    }
}

// Backend payloads. Ids are opaque strings; amounts may arrive as numbers or strings.

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMember {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(alias = "username")]
    pub login: String,
    #[serde(default)]
    pub deposit: Decimal,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default, alias = "mobileNumber")]
    pub mobile: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteExpense {
    #[serde(alias = "_id")]
    pub id: String,
    pub date: String,
    pub category: String,
    pub amount: Decimal,
    pub paid_by: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMeal {
    pub member_id: String,
    pub date: String,
    pub meal_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteGuestMeal {
    pub date: String,
    pub host_member_id: String,
    pub guest_meal_type: String,
    pub meal_time: String,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<Decimal>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDuty {
    pub date: String,
    pub assigned_member_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Backend dates may carry a time part; only the calendar day is kept.
pub fn day_part(s: &str) -> &str {
    s.get(..10).unwrap_or(s)
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .context("Login request failed")?
            .error_for_status()
            .context("Login rejected")?;
        let body: LoginResponse = resp.json().context("Unexpected login response")?;
        Ok(body.token)
    }

    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let resp = self
            .authed(self.http.get(&url))
            .send()
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error", url))?;
        resp.json::<T>()
            .with_context(|| format!("Unexpected payload from {}", url))
    }
}

/// Collections fetched in one refresh. `None` means the slice was not
/// requested or failed.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub members: Option<Vec<RemoteMember>>,
    pub expenses: Option<Vec<RemoteExpense>>,
    pub meals: Option<Vec<RemoteMeal>>,
    pub guest_meals: Option<Vec<RemoteGuestMeal>>,
    pub market: Option<Vec<RemoteDuty>>,
    pub failures: Vec<(Slice, String)>,
}

impl Snapshot {
    pub fn fetched(&self) -> Vec<Slice> {
        let mut out = Vec::new();
        if self.members.is_some() {
            out.push(Slice::Members);
        }
        if self.expenses.is_some() {
            out.push(Slice::Expenses);
        }
        if self.meals.is_some() {
            out.push(Slice::Meals);
        }
        if self.guest_meals.is_some() {
            out.push(Slice::GuestMeals);
        }
        if self.market.is_some() {
            out.push(Slice::Market);
        }
        out
    }
}

fn settle<T>(slice: Slice, res: Result<T>, failures: &mut Vec<(Slice, String)>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(slice = %slice, error = %format!("{:#}", e), "slice refresh failed");
            failures.push((slice, format!("{:#}", e)));
            None
        }
    }
}

/// Fetches every requested slice independently; one failure never aborts the others.
pub fn fetch_snapshot(client: &ApiClient, wanted: &SliceSet) -> Snapshot {
    let mut snap = Snapshot::default();
    for slice in wanted.iter() {
        let path = slice.path();
        match slice {
            Slice::Members => {
                snap.members = settle(slice, client.get_json(&path), &mut snap.failures)
            }
            Slice::Expenses => {
                snap.expenses = settle(slice, client.get_json(&path), &mut snap.failures)
            }
            Slice::Meals => snap.meals = settle(slice, client.get_json(&path), &mut snap.failures),
            Slice::GuestMeals => {
                snap.guest_meals = settle(slice, client.get_json(&path), &mut snap.failures)
            }
            Slice::Market => {
                snap.market = settle(slice, client.get_json(&path), &mut snap.failures)
            }
        }
    }
    snap
}
