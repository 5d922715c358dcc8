use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str, today_iso};
use crate::ipc::types::{AppState, Request};
use crate::prompt;

use super::plans;

pub const STATUSES: [&str; 3] = ["not-started", "completed", "missed"];
const DEFAULT_RECENT_DAYS: usize = 7;

/// Per-plan execution summary over a recent window. Days with no stored
/// status count as not-started.
pub struct Summary {
    pub execution_rate: f64,
    pub completed: usize,
    pub missed: usize,
    pub not_started: usize,
    pub recent: Vec<(String, String)>,
}

impl Summary {
    /// The context block the autopsy prompt and the fallback classifier share.
    pub fn context_block(&self) -> String {
        prompt::progress_context(self.execution_rate, &self.recent)
    }
}

pub fn load_days(conn: &Connection, plan_id: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut stmt =
        conn.prepare("SELECT day, status FROM progress_days WHERE plan_id = ? ORDER BY day")?;
    let days = stmt
        .query_map([plan_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(days)
}

pub fn summarize(
    conn: &Connection,
    plan_id: &str,
    recent_days: usize,
) -> anyhow::Result<Summary> {
    let stored = load_days(conn, plan_id)?;
    let today = chrono::Utc::now().date_naive();
    let window = recent_days.max(1);

    let mut recent = Vec::with_capacity(window);
    let mut completed = 0;
    let mut missed = 0;
    for offset in (0..window).rev() {
        let day: NaiveDate = today - Duration::days(offset as i64);
        let key = day.to_string();
        let status = stored
            .get(&key)
            .cloned()
            .unwrap_or_else(|| "not-started".to_string());
        match status.as_str() {
            "completed" => completed += 1,
            "missed" => missed += 1,
            _ => {}
        }
        recent.push((key, status));
    }
    let not_started = window - completed - missed;
    let execution_rate = 100.0 * completed as f64 / window as f64;

    Ok(Summary {
        execution_rate,
        completed,
        missed,
        not_started,
        recent,
    })
}

fn require_plan(conn: &Connection, req: &Request) -> Result<String, serde_json::Value> {
    let plan_id = required_str(req, "planId")?;
    match plans::plan_exists(conn, &plan_id) {
        Ok(true) => Ok(plan_id),
        Ok(false) => Err(err(&req.id, "not_found", "plan not found", None)),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let plan_id = match require_plan(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match load_days(conn, &plan_id) {
        Ok(days) => ok(&req.id, json!({ "planId": plan_id, "days": days })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let plan_id = match require_plan(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let day = match required_str(req, "date") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if NaiveDate::parse_from_str(&day, "%Y-%m-%d").is_err() {
        return err(
            &req.id,
            "bad_params",
            format!("date must be YYYY-MM-DD, got {:?}", day),
            None,
        );
    }
    let status = match required_str(req, "status") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !STATUSES.contains(&status.as_str()) {
        return err(
            &req.id,
            "invalid_status",
            format!("status must be one of {:?}", STATUSES),
            None,
        );
    }

    match conn.execute(
        "INSERT INTO progress_days(plan_id, day, status) VALUES(?, ?, ?)
         ON CONFLICT(plan_id, day) DO UPDATE SET status = excluded.status",
        (&plan_id, &day, &status),
    ) {
        Ok(_) => ok(
            &req.id,
            json!({ "planId": plan_id, "day": day, "status": status }),
        ),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let plan_id = match require_plan(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let recent_days = req
        .params
        .get("recentDays")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(DEFAULT_RECENT_DAYS);

    match summarize(conn, &plan_id, recent_days) {
        Ok(s) => ok(
            &req.id,
            json!({
                "planId": plan_id,
                "asOf": today_iso(),
                "executionRate": s.execution_rate,
                "completed": s.completed,
                "missed": s.missed,
                "notStarted": s.not_started,
                "recent": s.recent.iter().map(|(day, status)| json!({
                    "day": day,
                    "status": status,
                })).collect::<Vec<_>>(),
                "context": s.context_block(),
            }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "progress.get" => Some(handle_get(state, req)),
        "progress.set" => Some(handle_set(state, req)),
        "progress.summary" => Some(handle_summary(state, req)),
        _ => None,
    }
}
