use serde_json::json;
use tracing::info;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str, today_iso};
use crate::ipc::types::{AppState, Request};
use crate::{llm, model, prompt};

use super::{plans, progress, timetable};

const ADAPT_WINDOW_DAYS: usize = 7;

fn handle_plan_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let owner_id = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // Required fields are rejected before any network call.
    let aim = match required_str(req, "aim") {
        Ok(v) if !v.trim().is_empty() => v,
        Ok(_) => return err(&req.id, "bad_params", "aim must not be empty", None),
        Err(resp) => return resp,
    };
    let due_date = match required_str(req, "dueDate") {
        Ok(v) if !v.trim().is_empty() => v,
        Ok(_) => return err(&req.id, "bad_params", "dueDate must not be empty", None),
        Err(resp) => return resp,
    };
    let category = match required_str(req, "category") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let difficulty = match required_str(req, "difficulty") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let prompt = prompt::plan_generation(&aim, &category, &difficulty, &due_date, &today_iso());
    let raw = match llm::generate_json(&prompt) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "llm_failed", e.to_string(), None),
    };
    let doc = match model::parse_plan_doc(raw) {
        Ok(d) => d,
        Err(e) => return err(&req.id, "llm_bad_payload", e.to_string(), None),
    };

    let plan_id = match plans::insert_plan(
        conn,
        &owner_id,
        &category,
        &difficulty,
        Some(&due_date),
        &doc,
    ) {
        Ok(id) => id,
        Err(e) => {
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "plans" })),
            )
        }
    };
    info!(plan_id = %plan_id, title = %doc.title, "generated plan stored");

    match plans::load_plan(conn, &plan_id) {
        Ok(Some(plan)) => ok(&req.id, json!({ "plan": plans::plan_json(&plan) })),
        Ok(None) => err(&req.id, "not_found", "stored plan vanished", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_timetable_adapt(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let plan_id = match required_str(req, "planId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let problem = match required_str(req, "problem") {
        Ok(v) if !v.trim().is_empty() => v,
        Ok(_) => return err(&req.id, "bad_params", "problem must not be empty", None),
        Err(resp) => return resp,
    };

    let plan = match plans::load_plan(conn, &plan_id) {
        Ok(Some(p)) => p,
        Ok(None) => return err(&req.id, "not_found", "plan not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if plan.doc.timetable.is_empty() {
        return err(&req.id, "bad_params", "plan has no timetable to adapt", None);
    }

    let summary = match progress::summarize(conn, &plan_id, ADAPT_WINDOW_DAYS) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let prompt = prompt::adapted_timetable(
        &plan.doc.title,
        &plan.doc.timetable,
        summary.execution_rate,
        summary.missed,
        &problem,
    );
    let raw = match llm::generate_json(&prompt) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "llm_failed", e.to_string(), None),
    };

    let Some(slots_value) = raw.get("timetable").cloned() else {
        return err(
            &req.id,
            "llm_bad_payload",
            "model response had no timetable",
            None,
        );
    };
    let slots = match model::slots_from_value(slots_value) {
        Ok(s) if !s.is_empty() => s,
        Ok(_) => {
            return err(
                &req.id,
                "llm_bad_payload",
                "model returned an empty timetable",
                None,
            )
        }
        Err(e) => return err(&req.id, "llm_bad_payload", e.to_string(), None),
    };
    let explanation = raw
        .get("explanation")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    if let Err(e) = timetable::save_slots(conn, &plan_id, &slots) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({
            "planId": plan_id,
            "timetable": slots,
            "explanation": explanation,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "plan.generate" => Some(handle_plan_generate(state, req)),
        "timetable.adapt" => Some(handle_timetable_adapt(state, req)),
        _ => None,
    }
}
