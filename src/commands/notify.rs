// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::MessError;
use crate::ledger::{self, Actor};
use crate::models::Member;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let actor = ledger::actor_from(conn, m)?;
    match m.subcommand() {
        Some(("list", sub)) => {
            let member = match sub.get_one::<String>("member") {
                Some(name) => Some(visible_member(conn, &actor, name)?),
                None => match &actor {
                    Actor::Member(me) => Some(me.clone()),
                    Actor::Admin => None,
                },
            };
            let unread_only = sub.get_flag("unread");
            let rows = list(conn, member.as_ref().map(|m| m.id), unread_only)?;
            println!(
                "{}",
                pretty_table(&["ID", "Member", "Message", "Read", "When"], rows)
            );
        }
        Some(("read", sub)) => {
            let member = visible_member(conn, &actor, sub.get_one::<String>("member").unwrap())?;
            let n = conn.execute(
                "UPDATE notifications SET is_read=1 WHERE member_id=?1 AND is_read=0",
                params![member.id],
            )?;
            println!("Marked {} notification(s) read for {}", n, member.name);
        }
        _ => {}
    }
    Ok(())
}

fn visible_member(conn: &Connection, actor: &Actor, name: &str) -> Result<Member> {
    let member = ledger::member_by_name(conn, name)?;
    match actor {
        Actor::Member(me) if me.id != member.id && !actor.is_privileged() => Err(
            MessError::PermissionDenied("members can only read their own notifications".to_string())
                .into(),
        ),
        _ => Ok(member),
    }
}

pub fn list(
    conn: &Connection,
    member_id: Option<i64>,
    unread_only: bool,
) -> Result<Vec<Vec<String>>> {
    let mut sql = String::from(
        "SELECT n.id, m.name, n.message, n.is_read, n.created_at
         FROM notifications n JOIN members m ON n.member_id=m.id WHERE 1=1",
    );
    let mut args: Vec<i64> = Vec::new();
    if let Some(id) = member_id {
        sql.push_str(" AND n.member_id=?");
        args.push(id);
    }
    if unread_only {
        sql.push_str(" AND n.is_read=0");
    }
    sql.push_str(" ORDER BY n.id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args), |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, bool>(3)?,
            r.get::<_, String>(4)?,
        ))
    })?;
    let mut data = Vec::new();
    for row in rows {
        let (id, name, msg, read, when) = row?;
        data.push(vec![
            id.to_string(),
            name,
            msg,
            if read { "yes".into() } else { "no".into() },
            when,
        ]);
    }
    Ok(data)
}
