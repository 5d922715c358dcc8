use std::path::PathBuf;

use serde_json::json;

use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};

use super::plans::{self, StoredPlan};

fn load_for_report(
    state: &mut AppState,
    req: &Request,
) -> Result<StoredPlan, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let plan_id = required_str(req, "planId")?;
    match plans::load_plan(conn, &plan_id) {
        Ok(Some(p)) => Ok(p),
        Ok(None) => Err(err(&req.id, "not_found", "plan not found", None)),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn handle_plan_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let plan = match load_for_report(state, req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({
            "planId": plan.id,
            "model": export::plan_model(&plan.doc),
        }),
    )
}

fn write_export(req: &Request, out_path: &str, contents: &str) -> serde_json::Value {
    let path = PathBuf::from(out_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return err(&req.id, "io_failed", e.to_string(), None);
            }
        }
    }
    match std::fs::write(&path, contents) {
        Ok(()) => ok(
            &req.id,
            json!({ "outPath": path.to_string_lossy(), "bytes": contents.len() }),
        ),
        Err(e) => err(&req.id, "io_failed", e.to_string(), None),
    }
}

fn handle_export_text(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let plan = match load_for_report(state, req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    write_export(req, &out_path, &export::plan_text(&plan.doc))
}

fn handle_export_json(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let plan = match load_for_report(state, req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let doc = plans::plan_json(&plan);
    let contents = match serde_json::to_string_pretty(&doc) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "io_failed", e.to_string(), None),
    };
    write_export(req, &out_path, &contents)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.planModel" => Some(handle_plan_model(state, req)),
        "export.planText" => Some(handle_export_text(state, req)),
        "export.planJson" => Some(handle_export_json(state, req)),
        _ => None,
    }
}
