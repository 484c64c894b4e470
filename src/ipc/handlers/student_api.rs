//! Methods called by the student-side client. Roster and LRN arrive
//! explicitly on every request; there is no token binding the two. That
//! mirrors the dashboard this replaces and is tracked as an open security
//! gap in DESIGN.md rather than papered over here.

use crate::ipc::error::{ok, store_err};
use crate::ipc::helpers::{get_required_int, get_required_str, require_db, resolve_roster};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let (lrn, password) = match (
        get_required_str(&req.params, "lrn"),
        get_required_str(&req.params, "password"),
    ) {
        (Ok(l), Ok(p)) => (l, p),
        (Err(e), _) | (_, Err(e)) => return e.response(&req.id),
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match store::verify_login(conn, &roster, &lrn, &password) {
        Ok(identity) => ok(
            &req.id,
            json!({
                "message": "Login successful.",
                "studentLrn": identity.lrn,
                "studentName": identity.name,
                "roster": roster.table(),
            }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Analytics fetch keeps the "absent" case distinguishable from "present
/// with zero counts": both shapes carry counts, only `found` differs.
fn handle_get_analytics(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let lrn = match get_required_str(&req.params, "lrn") {
        Ok(l) => l,
        Err(e) => return e.response(&req.id),
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match store::fetch_analytics(conn, &roster, &lrn) {
        Ok(Some(analytics)) => ok(
            &req.id,
            json!({
                "found": true,
                "screenshotsTaken": analytics.screenshots_taken,
                "timesExited": analytics.times_exited,
                "keyboardUsed": analytics.keyboard_used,
            }),
        ),
        Ok(None) => ok(
            &req.id,
            json!({
                "found": false,
                "message": "Student not found in this class.",
                "screenshotsTaken": 0,
                "timesExited": 0,
                "keyboardUsed": 0,
            }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_update_analytics(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let lrn = match get_required_str(&req.params, "lrn") {
        Ok(l) => l,
        Err(e) => return e.response(&req.id),
    };
    let deltas = (
        get_required_int(&req.params, "screenshotsTakenDelta"),
        get_required_int(&req.params, "timesExitedDelta"),
        get_required_int(&req.params, "keyboardUsedDelta"),
    );
    let (screenshots, exits, keyboard) = match deltas {
        (Ok(s), Ok(e), Ok(k)) => (s, e, k),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return e.response(&req.id),
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match store::apply_analytics_delta(conn, &roster, &lrn, screenshots, exits, keyboard) {
        Ok(()) => ok(&req.id, json!({ "message": "Analytics updated." })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_get_exit_code(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let lrn = match get_required_str(&req.params, "lrn") {
        Ok(l) => l,
        Err(e) => return e.response(&req.id),
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match store::fetch_exit_code(conn, &roster, &lrn) {
        Ok(code) => ok(&req.id, json!({ "exitCode": code })),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Acknowledge-only; nothing is persisted for a heartbeat in the current
/// design.
fn handle_heartbeat(state: &mut AppState, req: &Request) -> serde_json::Value {
    // Roster validation still applies even though nothing is written.
    if let Err(e) = resolve_roster(state, &req.params) {
        return e.response(&req.id);
    }
    let lrn = match get_required_str(&req.params, "lrn") {
        Ok(l) => l,
        Err(e) => return e.response(&req.id),
    };
    let status = req
        .params
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    ok(
        &req.id,
        json!({
            "message": format!("Heartbeat received for {}, status: {}", lrn, status),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "student.login" => Some(handle_login(state, req)),
        "student.getAnalytics" => Some(handle_get_analytics(state, req)),
        "student.updateAnalytics" => Some(handle_update_analytics(state, req)),
        "student.getExitCode" => Some(handle_get_exit_code(state, req)),
        "student.backgroundHeartbeat" => Some(handle_heartbeat(state, req)),
        _ => None,
    }
}
