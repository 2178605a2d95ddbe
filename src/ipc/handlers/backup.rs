use crate::backup;
use crate::ipc::handlers::core::select_workspace;
use crate::ipc::helpers::{get_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use std::path::PathBuf;

fn handle_export(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let Some(workspace) = state.workspace.clone() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let out_path = PathBuf::from(get_str(&req.params, "outPath")?);
    let summary = backup::export_workspace_bundle(&workspace, &out_path)
        .map_err(|e| HandlerErr::new("io_failed", format!("{e:#}")))?;
    tracing::info!(out = %out_path.display(), sha256 = %summary.db_sha256, "workspace exported");
    Ok(json!({
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "dbSha256": summary.db_sha256,
    }))
}

fn handle_import(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let Some(workspace) = state.workspace.clone() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let in_path = PathBuf::from(get_str(&req.params, "inPath")?);

    // Release the connection so the database file can be replaced.
    state.db = None;
    let imported = backup::import_workspace_bundle(&in_path, &workspace);
    let reopened = select_workspace(state, &workspace);

    let summary = imported.map_err(|e| HandlerErr::new("import_failed", format!("{e:#}")))?;
    reopened.map_err(|e| HandlerErr::new("db_open_failed", format!("{e:#}")))?;
    tracing::info!(from = %in_path.display(), "workspace imported");
    Ok(json!({ "bundleFormatDetected": summary.bundle_format_detected }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "backup.export" => Some(respond(req, handle_export(state, req))),
        "backup.import" => Some(respond(req, handle_import(state, req))),
        _ => None,
    }
}
