use rusqlite::Connection;
use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_index, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model;
use crate::schedule::{self, Slot};

use super::plans;

pub fn load_slots(conn: &Connection, plan_id: &str) -> anyhow::Result<Vec<Slot>> {
    let mut stmt = conn.prepare(
        "SELECT time_label, task, completed FROM timetable_slots
         WHERE plan_id = ? ORDER BY sort_order",
    )?;
    let slots = stmt
        .query_map([plan_id], |r| {
            Ok(Slot {
                time: r.get(0)?,
                task: r.get(1)?,
                completed: r.get::<_, i64>(2)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(slots)
}

/// Whole-list overwrite: the in-memory list replaces the stored one in a
/// single transaction. No diffing, last writer wins.
pub fn save_slots(conn: &Connection, plan_id: &str, slots: &[Slot]) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM timetable_slots WHERE plan_id = ?", [plan_id])?;
    for (i, s) in slots.iter().enumerate() {
        tx.execute(
            "INSERT INTO timetable_slots(plan_id, sort_order, time_label, task, completed)
             VALUES(?, ?, ?, ?, ?)",
            (plan_id, i as i64, &s.time, &s.task, s.completed as i64),
        )?;
    }
    tx.commit()?;
    Ok(())
}

fn require_plan(
    conn: &Connection,
    req: &Request,
) -> Result<(String, Vec<Slot>), serde_json::Value> {
    let plan_id = required_str(req, "planId")?;
    match plans::plan_exists(conn, &plan_id) {
        Ok(false) => Err(err(&req.id, "not_found", "plan not found", None)),
        Ok(true) => {
            let slots = load_slots(conn, &plan_id)
                .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
            Ok((plan_id, slots))
        }
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn persist(
    conn: &Connection,
    req: &Request,
    plan_id: &str,
    slots: &[Slot],
) -> Result<serde_json::Value, serde_json::Value> {
    save_slots(conn, plan_id, slots)
        .map_err(|e| err(&req.id, "db_update_failed", e.to_string(), None))?;
    Ok(ok(
        &req.id,
        json!({ "planId": plan_id, "timetable": slots }),
    ))
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match require_plan(conn, req) {
        Ok((plan_id, slots)) => ok(
            &req.id,
            json!({ "planId": plan_id, "timetable": slots }),
        ),
        Err(resp) => resp,
    }
}

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (plan_id, _) = match require_plan(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(raw) = req.params.get("slots").cloned() else {
        return err(&req.id, "bad_params", "missing slots", None);
    };
    // Shape errors are the caller's payload being wrong; invalid_time is
    // reserved for well-formed slots with unparseable labels.
    let mut slots: Vec<Slot> = match serde_json::from_value(raw) {
        Ok(s) => s,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid timetable payload: {}", e),
                None,
            )
        }
    };
    if let Err(e) = model::sanitize_timetable(&mut slots) {
        return err(&req.id, "invalid_time", e.to_string(), None);
    }
    match persist(conn, req, &plan_id, &slots) {
        Ok(resp) | Err(resp) => resp,
    }
}

fn handle_add_slot(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (plan_id, mut slots) = match require_plan(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let task = match required_str(req, "task") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let time = optional_str(req, "time");
    if let Some(t) = &time {
        if schedule::parse_time_label(t).is_none() {
            return err(
                &req.id,
                "invalid_time",
                format!("invalid time label {:?}", t),
                None,
            );
        }
    }
    schedule::add_slot(&mut slots, task, time);
    match persist(conn, req, &plan_id, &slots) {
        Ok(resp) | Err(resp) => resp,
    }
}

fn handle_retime(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (plan_id, mut slots) = match require_plan(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let index = match required_index(req, "index") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let time = match required_str(req, "time") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !schedule::retime_slot(&mut slots, index, &time) {
        return err(
            &req.id,
            "invalid_time",
            format!("bad index or time label {:?}", time),
            None,
        );
    }
    match persist(conn, req, &plan_id, &slots) {
        Ok(resp) | Err(resp) => resp,
    }
}

fn handle_move(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (plan_id, mut slots) = match require_plan(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let from = match required_index(req, "from") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let to = match required_index(req, "to") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !schedule::move_slot(&mut slots, from, to) {
        return err(&req.id, "bad_params", "slot index out of range", None);
    }
    match persist(conn, req, &plan_id, &slots) {
        Ok(resp) | Err(resp) => resp,
    }
}

fn handle_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (plan_id, mut slots) = match require_plan(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let index = match required_index(req, "index") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !schedule::remove_slot(&mut slots, index) {
        return err(&req.id, "bad_params", "slot index out of range", None);
    }
    match persist(conn, req, &plan_id, &slots) {
        Ok(resp) | Err(resp) => resp,
    }
}

fn handle_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let (plan_id, mut slots) = match require_plan(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let index = match required_index(req, "index") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !schedule::toggle_completed(&mut slots, index) {
        return err(&req.id, "bad_params", "slot index out of range", None);
    }
    match persist(conn, req, &plan_id, &slots) {
        Ok(resp) | Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.get" => Some(handle_get(state, req)),
        "timetable.save" => Some(handle_save(state, req)),
        "timetable.addSlot" => Some(handle_add_slot(state, req)),
        "timetable.retime" => Some(handle_retime(state, req)),
        "timetable.move" => Some(handle_move(state, req)),
        "timetable.removeSlot" => Some(handle_remove(state, req)),
        "timetable.toggleCompleted" => Some(handle_toggle(state, req)),
        _ => None,
    }
}
