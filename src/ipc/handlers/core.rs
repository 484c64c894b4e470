use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster::RosterRegistry;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Open (or create) a workspace: load the roster registry from
/// `rosters.json`, then open the database and make sure every registered
/// roster has its table.
fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    if let Err(e) = std::fs::create_dir_all(&path) {
        return err(&req.id, "db_open_failed", format!("{e:?}"), None);
    }

    let registry = match RosterRegistry::load(&path) {
        Ok(r) => r,
        Err(e) => return err(&req.id, "bad_config", format!("{e:?}"), None),
    };

    match db::open_db(&path, &registry) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            let names = registry.names().to_vec();
            state.rosters = Some(registry);
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "rosters": names,
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
