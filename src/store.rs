use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::auth;
use crate::roster::RosterId;

/// Failure classes for roster operations. Validation and authorization
/// failures happen before any database access; backend detail goes to the
/// log and callers only see a generic message.
#[derive(Debug)]
pub enum StoreError {
    Validation(String),
    Authorization(String),
    NotFound(String),
    InvalidCredentials,
    Duplicate(String),
    Backend,
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "bad_params",
            StoreError::Authorization(_) => "unauthorized_roster",
            StoreError::NotFound(_) => "not_found",
            StoreError::InvalidCredentials => "invalid_credentials",
            StoreError::Duplicate(_) => "duplicate_lrn",
            StoreError::Backend => "db_query_failed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            StoreError::Validation(m)
            | StoreError::Authorization(m)
            | StoreError::NotFound(m)
            | StoreError::Duplicate(m) => m.clone(),
            StoreError::InvalidCredentials => "Invalid LRN or password.".to_string(),
            StoreError::Backend => "Database query error.".to_string(),
        }
    }
}

fn backend(context: &str, e: rusqlite::Error) -> StoreError {
    log::error!("SQL error ({}): {}", context, e);
    StoreError::Backend
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub lrn: String,
    pub name: String,
    pub times_exited: i64,
    pub screenshots_taken: i64,
    pub keyboard_used: i64,
    pub flagged_as_cheater: bool,
    pub exit_code: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub screenshots_taken: i64,
    pub times_exited: i64,
    pub keyboard_used: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginIdentity {
    pub lrn: String,
    pub name: String,
}

pub fn is_valid_exit_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

/// All rows in the roster. No ORDER BY on purpose: callers observe
/// insertion order and the ordering is not a guarantee.
pub fn fetch_all(conn: &Connection, roster: &RosterId) -> Result<Vec<StudentRecord>, StoreError> {
    let sql = format!(
        "SELECT lrn, name, times_exited, screenshots_taken, keyboard_used,
                flagged_as_cheater, exit_code
         FROM {}",
        roster.table()
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| backend("fetch_all", e))?;
    stmt.query_map([], |r| {
        Ok(StudentRecord {
            lrn: r.get(0)?,
            name: r.get(1)?,
            times_exited: r.get(2)?,
            screenshots_taken: r.get(3)?,
            keyboard_used: r.get(4)?,
            flagged_as_cheater: r.get::<_, i64>(5)? != 0,
            exit_code: r.get(6)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(|e| backend("fetch_all", e))
}

pub fn update_exit_code(
    conn: &Connection,
    roster: &RosterId,
    lrn: &str,
    code: &str,
) -> Result<(), StoreError> {
    if !is_valid_exit_code(code) {
        return Err(StoreError::Validation(
            "Exit code must be exactly 6 digits.".to_string(),
        ));
    }
    let sql = format!("UPDATE {} SET exit_code = ?1 WHERE lrn = ?2", roster.table());
    let affected = conn
        .execute(&sql, (code, lrn))
        .map_err(|e| backend("update_exit_code", e))?;
    if affected == 0 {
        return Err(StoreError::NotFound(
            "Student not found or no change made.".to_string(),
        ));
    }
    Ok(())
}

pub fn update_flag(
    conn: &Connection,
    roster: &RosterId,
    lrn: &str,
    flagged: bool,
) -> Result<(), StoreError> {
    let sql = format!(
        "UPDATE {} SET flagged_as_cheater = ?1 WHERE lrn = ?2",
        roster.table()
    );
    let affected = conn
        .execute(&sql, (flagged as i64, lrn))
        .map_err(|e| backend("update_flag", e))?;
    if affected == 0 {
        return Err(StoreError::NotFound(
            "Student not found or no change made.".to_string(),
        ));
    }
    Ok(())
}

/// Zero the three counters and clear the flag for every row. Idempotent;
/// rows are mutated in place, never deleted.
pub fn reset_all(conn: &Connection, roster: &RosterId) -> Result<usize, StoreError> {
    let sql = format!(
        "UPDATE {} SET times_exited = 0, screenshots_taken = 0,
                keyboard_used = 0, flagged_as_cheater = 0",
        roster.table()
    );
    conn.execute(&sql, [])
        .map_err(|e| backend("reset_session", e))
}

pub fn delete_student(conn: &Connection, roster: &RosterId, lrn: &str) -> Result<(), StoreError> {
    if lrn.is_empty() {
        return Err(StoreError::Validation("LRN is required.".to_string()));
    }
    let sql = format!("DELETE FROM {} WHERE lrn = ?1", roster.table());
    let affected = conn
        .execute(&sql, [lrn])
        .map_err(|e| backend("delete_student", e))?;
    if affected == 0 {
        return Err(StoreError::NotFound("Student not found.".to_string()));
    }
    Ok(())
}

/// Insert a new student with zeroed counters and a freshly generated
/// six-digit exit code. The CSV import path deliberately does NOT go
/// through here: imported rows get an empty exit code.
pub fn add_student(
    conn: &Connection,
    roster: &RosterId,
    lrn: &str,
    name: &str,
    raw_password: &str,
) -> Result<String, StoreError> {
    if lrn.is_empty() || name.is_empty() || raw_password.is_empty() {
        return Err(StoreError::Validation(
            "LRN, name, and password are required.".to_string(),
        ));
    }
    let password_hash = auth::hash_password(raw_password).map_err(|e| {
        log::error!("hash error (add_student): {}", e);
        StoreError::Backend
    })?;
    let exit_code = generate_exit_code();
    insert_student(conn, roster, lrn, name, &password_hash, &exit_code)?;
    Ok(exit_code)
}

/// Shared insert for the single-add and import paths. Counters start at
/// zero and the flag clear; the exit code is whatever the caller chose.
pub fn insert_student(
    conn: &Connection,
    roster: &RosterId,
    lrn: &str,
    name: &str,
    password_hash: &str,
    exit_code: &str,
) -> Result<(), StoreError> {
    let sql = format!(
        "INSERT INTO {} (lrn, name, password_hash, times_exited, screenshots_taken,
                keyboard_used, flagged_as_cheater, exit_code)
         VALUES (?1, ?2, ?3, 0, 0, 0, 0, ?4)",
        roster.table()
    );
    conn.execute(&sql, (lrn, name, password_hash, exit_code))
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(format!("LRN '{}' already exists", lrn))
            } else {
                backend("insert_student", e)
            }
        })?;
    Ok(())
}

pub fn generate_exit_code() -> String {
    use rand::Rng;
    format!("{:06}", rand::thread_rng().gen_range(0..=999_999u32))
}

/// Apply `counter = counter + delta` for all three counters in one
/// statement. Counters are clamped at zero so a stray negative delta can
/// never take one below it.
pub fn apply_analytics_delta(
    conn: &Connection,
    roster: &RosterId,
    lrn: &str,
    screenshots_delta: i64,
    exits_delta: i64,
    keyboard_delta: i64,
) -> Result<(), StoreError> {
    let sql = format!(
        "UPDATE {} SET
                screenshots_taken = MAX(0, screenshots_taken + ?1),
                times_exited = MAX(0, times_exited + ?2),
                keyboard_used = MAX(0, keyboard_used + ?3)
         WHERE lrn = ?4",
        roster.table()
    );
    let affected = conn
        .execute(&sql, (screenshots_delta, exits_delta, keyboard_delta, lrn))
        .map_err(|e| backend("update_analytics", e))?;
    if affected == 0 {
        return Err(StoreError::NotFound(
            "Student LRN not found or no change made.".to_string(),
        ));
    }
    Ok(())
}

/// `None` is the not-found indicator; the wire layer reports zeros next to
/// a `found: false` flag so "absent" stays distinguishable from "present
/// with zero counts".
pub fn fetch_analytics(
    conn: &Connection,
    roster: &RosterId,
    lrn: &str,
) -> Result<Option<Analytics>, StoreError> {
    let sql = format!(
        "SELECT screenshots_taken, times_exited, keyboard_used FROM {} WHERE lrn = ?1",
        roster.table()
    );
    conn.query_row(&sql, [lrn], |r| {
        Ok(Analytics {
            screenshots_taken: r.get(0)?,
            times_exited: r.get(1)?,
            keyboard_used: r.get(2)?,
        })
    })
    .optional()
    .map_err(|e| backend("get_analytics", e))
}

pub fn fetch_exit_code(
    conn: &Connection,
    roster: &RosterId,
    lrn: &str,
) -> Result<String, StoreError> {
    let sql = format!("SELECT exit_code FROM {} WHERE lrn = ?1", roster.table());
    conn.query_row(&sql, [lrn], |r| r.get::<_, String>(0))
        .optional()
        .map_err(|e| backend("get_exit_code", e))?
        .ok_or_else(|| {
            StoreError::NotFound("Student LRN not found or exit code not set.".to_string())
        })
}

/// Password login. An unknown LRN and a wrong password fail identically,
/// and a miss still pays for one hashing round so the two stay in the same
/// timing class.
pub fn verify_login(
    conn: &Connection,
    roster: &RosterId,
    lrn: &str,
    raw_password: &str,
) -> Result<LoginIdentity, StoreError> {
    if lrn.is_empty() || raw_password.is_empty() {
        return Err(StoreError::Validation(
            "LRN and password are required.".to_string(),
        ));
    }
    let sql = format!("SELECT lrn, name, password_hash FROM {} WHERE lrn = ?1", roster.table());
    let row = conn
        .query_row(&sql, [lrn], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })
        .optional()
        .map_err(|e| backend("student_login", e))?;

    match row {
        Some((lrn, name, stored_hash)) => {
            if auth::verify_password(raw_password, &stored_hash) {
                Ok(LoginIdentity { lrn, name })
            } else {
                Err(StoreError::InvalidCredentials)
            }
        }
        None => {
            auth::burn_hash(raw_password);
            Err(StoreError::InvalidCredentials)
        }
    }
}
