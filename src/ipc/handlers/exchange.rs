use crate::exchange;
use crate::ipc::error::{ok, store_err};
use crate::ipc::helpers::{get_required_str, require_db, resolve_roster, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::Path;

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Write the session export to `outPath` and report the attachment name
/// the embedding dashboard should offer for download.
fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let out_path = match get_required_str(&req.params, "outPath") {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };

    let (csv, row_count) = match exchange::export_csv(conn, &roster) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &e),
    };
    if let Err(e) = std::fs::write(&out_path, &csv) {
        return HandlerErr {
            code: "io_failed",
            message: format!("could not write export: {}", e),
            details: None,
        }
        .response(&req.id);
    }

    ok(
        &req.id,
        json!({
            "outPath": out_path,
            "filename": exchange::export_filename(chrono::Local::now()),
            "rowCount": row_count,
        }),
    )
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match resolve_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let in_path = match get_required_str(&req.params, "inPath") {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    if !has_csv_extension(Path::new(&in_path)) {
        return HandlerErr::bad_params("Please upload a CSV file only.").response(&req.id);
    }
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };

    let text = match std::fs::read_to_string(&in_path) {
        Ok(t) => t,
        Err(_) => {
            return HandlerErr::bad_params("Could not read the uploaded file.").response(&req.id)
        }
    };

    match exchange::import_csv(conn, &roster, &text) {
        Ok(summary) => ok(
            &req.id,
            serde_json::to_value(&summary).unwrap_or_else(|_| json!({})),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exchange.exportSessionCsv" => Some(handle_export(state, req)),
        "exchange.importStudentsCsv" => Some(handle_import(state, req)),
        _ => None,
    }
}
