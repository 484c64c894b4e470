use crate::ipc::error::{ok, store_err};
use crate::ipc::helpers::{get_required_str, require_db, resolve_roster};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match store::fetch_all(conn, &roster) {
        Ok(records) => ok(
            &req.id,
            json!({
                "roster": roster.table(),
                "students": records,
            }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_update_exit_code(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let (lrn, code) = match (
        get_required_str(&req.params, "lrn"),
        get_required_str(&req.params, "exitCode"),
    ) {
        (Ok(l), Ok(c)) => (l.trim().to_string(), c.trim().to_string()),
        (Err(e), _) | (_, Err(e)) => return e.response(&req.id),
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match store::update_exit_code(conn, &roster, &lrn, &code) {
        Ok(()) => ok(&req.id, json!({ "message": "Exit code updated successfully." })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_update_flag_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let lrn = match get_required_str(&req.params, "lrn") {
        Ok(l) => l.trim().to_string(),
        Err(e) => return e.response(&req.id),
    };
    // The dashboard posts the flag as the string "true"/"false"; accept a
    // JSON bool too.
    let flagged = match req.params.get("isFlagged") {
        Some(v) if v.is_boolean() => v.as_bool().unwrap_or(false),
        Some(v) => v.as_str() == Some("true"),
        None => {
            return crate::ipc::helpers::HandlerErr::bad_params("missing isFlagged")
                .response(&req.id)
        }
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match store::update_flag(conn, &roster, &lrn, flagged) {
        Ok(()) => ok(
            &req.id,
            json!({ "message": "Flag status updated successfully." }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_reset_session(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match store::reset_all(conn, &roster) {
        Ok(rows) => ok(&req.id, json!({ "rowsReset": rows })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_delete_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let lrn = match get_required_str(&req.params, "lrn") {
        Ok(l) => l.trim().to_string(),
        Err(e) => return e.response(&req.id),
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match store::delete_student(conn, &roster, &lrn) {
        Ok(()) => ok(&req.id, json!({ "message": "Student deleted successfully." })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_add_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let fields = (
        get_required_str(&req.params, "lrn"),
        get_required_str(&req.params, "name"),
        get_required_str(&req.params, "password"),
    );
    let (lrn, name, password) = match fields {
        (Ok(l), Ok(n), Ok(p)) => (l.trim().to_string(), n.trim().to_string(), p),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return e.response(&req.id),
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match store::add_student(conn, &roster, &lrn, &name, &password) {
        Ok(exit_code) => ok(
            &req.id,
            json!({
                "message": "Student added successfully.",
                "lrn": lrn,
                "exitCode": exit_code,
            }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.list" => Some(handle_list(state, req)),
        "roster.updateExitCode" => Some(handle_update_exit_code(state, req)),
        "roster.updateFlagStatus" => Some(handle_update_flag_status(state, req)),
        "roster.resetSession" => Some(handle_reset_session(state, req)),
        "roster.deleteStudent" => Some(handle_delete_student(state, req)),
        "roster.addStudent" => Some(handle_add_student(state, req)),
        _ => None,
    }
}
