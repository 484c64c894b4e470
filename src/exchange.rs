use std::collections::HashMap;

use chrono::{DateTime, Local};
use rusqlite::Connection;
use serde::Serialize;

use crate::auth;
use crate::roster::RosterId;
use crate::store::{self, StoreError};

pub const EXPORT_HEADER: [&str; 7] = [
    "Student LRN",
    "Student Name",
    "Times Exited out of App",
    "Screenshots Taken",
    "Keyboard Used",
    "Flagged As Cheater?",
    "Exit Code",
];

const REQUIRED_COLUMNS: [&str; 3] = ["lrn", "name", "password"];

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Split CSV text into records. A record is usually one physical line, but
/// a quoted field may carry a newline, so the quote state has to survive
/// across lines before `parse_csv_record` sees the cells.
fn split_csv_records(text: &str) -> Vec<String> {
    let mut records = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    for line in text.lines() {
        if in_quotes {
            buf.push('\n');
        }
        buf.push_str(line);
        // Escaped quotes come doubled, so raw parity tracks the open state.
        if line.matches('"').count() % 2 == 1 {
            in_quotes = !in_quotes;
        }
        if !in_quotes {
            records.push(std::mem::take(&mut buf));
        }
    }
    if !buf.is_empty() {
        records.push(buf);
    }
    records
}

fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if ch == ',' && !in_quotes {
            out.push(buf);
            buf = String::new();
            i += 1;
            continue;
        }
        buf.push(ch);
        i += 1;
    }
    out.push(buf);
    out
}

/// Attachment name for a session export, e.g.
/// `student_session_data_2026-08-24_14-03-59.csv`.
pub fn export_filename(now: DateTime<Local>) -> String {
    format!(
        "student_session_data_{}.csv",
        now.format("%Y-%m-%d_%H-%M-%S")
    )
}

/// Render the whole roster as CSV text, returning the text and the number
/// of student rows. The flag column is `Yes`/`No`; passwords are never
/// exported. The row count comes from the records, not the physical lines,
/// since a quoted name may span several of those.
pub fn export_csv(conn: &Connection, roster: &RosterId) -> Result<(String, usize), StoreError> {
    let records = store::fetch_all(conn, roster)?;
    let row_count = records.len();
    let mut out = String::new();
    out.push_str(&EXPORT_HEADER.join(","));
    out.push('\n');
    for rec in records {
        let flagged = if rec.flagged_as_cheater { "Yes" } else { "No" };
        let fields = [
            csv_quote(&rec.lrn),
            csv_quote(&rec.name),
            rec.times_exited.to_string(),
            rec.screenshots_taken.to_string(),
            rec.keyboard_used.to_string(),
            flagged.to_string(),
            csv_quote(&rec.exit_code),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    Ok((out, row_count))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
    pub message: String,
    pub message_type: &'static str,
}

/// Map header cells to column indexes, case-insensitively, ignoring
/// columns we don't know about. The first cell may carry a UTF-8 BOM.
/// Session-export spellings ("Student LRN", "Student Name") count as their
/// short forms so an export can be fed back in; the export-only columns
/// are kept under their own keys so the format can be recognized.
fn map_header(cells: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, cell) in cells.iter().enumerate() {
        let clean = cell
            .trim_start_matches('\u{feff}')
            .trim()
            .to_ascii_lowercase();
        let key = match clean.as_str() {
            "student lrn" => "lrn",
            "student name" => "name",
            other => other,
        };
        if REQUIRED_COLUMNS.contains(&key) || key == "exit code" || key == "flagged as cheater?" {
            map.entry(key.to_string()).or_insert(idx);
        }
    }
    map
}

/// A header without a password column but with the export-only columns is
/// a re-imported session export. Passwords never round-trip, so rows from
/// such a file get an empty credential and the account cannot log in until
/// it is re-provisioned.
fn is_session_export(map: &HashMap<String, usize>) -> bool {
    !map.contains_key("password")
        && map.contains_key("lrn")
        && map.contains_key("name")
        && map.contains_key("exit code")
}

fn field<'a>(cells: &'a [String], map: &HashMap<String, usize>, key: &str) -> &'a str {
    map.get(key)
        .and_then(|&i| cells.get(i))
        .map(|s| s.trim())
        .unwrap_or("")
}

/// Best-effort import of `LRN, Name, Password` rows. Bad rows are recorded
/// and skipped, never aborting the file; rows inserted before a later
/// failure stay inserted. Imported students get an EMPTY exit code, unlike
/// the single-add path which generates one. That asymmetry is inherited
/// from the dashboard this replaces and kept as-is.
pub fn import_csv(
    conn: &Connection,
    roster: &RosterId,
    text: &str,
) -> Result<ImportSummary, StoreError> {
    let mut records = split_csv_records(text).into_iter();
    let Some(header_line) = records.next() else {
        return Err(StoreError::Validation(
            "Could not read the uploaded file.".to_string(),
        ));
    };

    let header_map = map_header(&parse_csv_record(&header_line));
    let reimport = is_session_export(&header_map);
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !header_map.contains_key(*c))
        .filter(|c| !(reimport && *c == "password"))
        .collect();
    if !missing.is_empty() {
        return Err(StoreError::Validation(format!(
            "Missing required columns: {}. Expected columns: LRN, Name, Password",
            missing.join(", ")
        )));
    }

    let mut success_count = 0usize;
    let mut error_count = 0usize;
    let mut errors: Vec<String> = Vec::new();

    for record in records {
        if record.trim().is_empty() {
            continue;
        }
        let cells = parse_csv_record(&record);
        let lrn = field(&cells, &header_map, "lrn").to_string();
        let name = field(&cells, &header_map, "name").to_string();
        let password = field(&cells, &header_map, "password").to_string();

        if lrn.is_empty() || name.is_empty() || (!reimport && password.is_empty()) {
            error_count += 1;
            errors.push(format!("Row with LRN '{}': Missing required fields", lrn));
            continue;
        }

        let password_hash = if reimport {
            String::new()
        } else {
            match auth::hash_password(&password) {
                Ok(h) => h,
                Err(e) => {
                    error_count += 1;
                    errors.push(format!("Error adding LRN '{}': {}", lrn, e));
                    continue;
                }
            }
        };

        match store::insert_student(conn, roster, &lrn, &name, &password_hash, "") {
            Ok(()) => success_count += 1,
            Err(StoreError::Duplicate(msg)) => {
                error_count += 1;
                errors.push(msg);
            }
            Err(StoreError::Backend) => {
                error_count += 1;
                errors.push(format!("Database error for LRN '{}'", lrn));
            }
            Err(other) => {
                error_count += 1;
                errors.push(format!("Error adding LRN '{}': {}", lrn, other.message()));
            }
        }
    }

    let (message, message_type) = summarize(success_count, error_count, &errors);
    Ok(ImportSummary {
        success_count,
        error_count,
        errors,
        message,
        message_type,
    })
}

fn summarize(success: usize, failed: usize, errors: &[String]) -> (String, &'static str) {
    let preview = |errors: &[String]| {
        let mut msg = errors
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if errors.len() > 5 {
            msg.push_str(&format!(" (and {} more)", errors.len() - 5));
        }
        msg
    };

    if success > 0 && failed == 0 {
        (
            format!("Successfully imported {} students.", success),
            "success",
        )
    } else if success > 0 {
        (
            format!(
                "Imported {} students successfully. {} failed. Errors: {}",
                success,
                failed,
                preview(errors)
            ),
            "warning",
        )
    } else {
        (
            format!(
                "Import failed. No students were added. Errors: {}",
                preview(errors)
            ),
            "error",
        )
    }
}
