// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config;
use crate::ledger;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => {
            let actor = ledger::actor_from(conn, sub)?;
            actor.require_admin("change settings")?;
            let key = sub.get_one::<String>("key").unwrap().trim();
            let value = sub.get_one::<String>("value").unwrap();
            config::set_checked(conn, key, value)?;
            info!(key, "setting updated");
            if key == config::API_TOKEN_KEY {
                println!("{} updated", key);
            } else {
                println!("{} = {}", key, value.trim());
            }
        }
        Some(("list", _)) => {
            let rows = config::effective_settings(conn)?
                .into_iter()
                .map(|(k, v)| vec![k, v])
                .collect();
            println!("{}", pretty_table(&["Setting", "Value"], rows));
        }
        _ => {}
    }
    Ok(())
}
