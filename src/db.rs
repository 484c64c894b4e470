use rusqlite::Connection;
use std::path::Path;

use crate::roster::{RosterId, RosterRegistry};

pub fn open_db(workspace: &Path, rosters: &RosterRegistry) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("paperclip.sqlite3");
    let conn = Connection::open(db_path)?;

    for roster in rosters.ids() {
        ensure_roster_table(&conn, &roster)?;
    }

    Ok(conn)
}

/// One table per registered roster. The table name comes from a validated
/// [`RosterId`]; every value in it is read and written via bound parameters.
fn ensure_roster_table(conn: &Connection, roster: &RosterId) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {}(
                lrn TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                times_exited INTEGER NOT NULL DEFAULT 0,
                screenshots_taken INTEGER NOT NULL DEFAULT 0,
                keyboard_used INTEGER NOT NULL DEFAULT 0,
                flagged_as_cheater INTEGER NOT NULL DEFAULT 0,
                exit_code TEXT NOT NULL DEFAULT ''
            )",
            roster.table()
        ),
        [],
    )?;
    Ok(())
}
