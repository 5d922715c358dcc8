use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_iso, optional_bool, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{self, Hurdle, Phase, PlanDoc, Resource};

use super::timetable;

/// A plan row plus its assembled document.
pub struct StoredPlan {
    pub id: String,
    pub owner_id: String,
    pub category: String,
    pub difficulty: String,
    pub due_date: Option<String>,
    pub created_at: String,
    pub archived: bool,
    pub doc: PlanDoc,
}

pub fn plan_exists(conn: &Connection, plan_id: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM plans WHERE id = ?", [plan_id], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Insert a validated document and its children as one new plan.
pub fn insert_plan(
    conn: &Connection,
    owner_id: &str,
    category: &str,
    difficulty: &str,
    due_date: Option<&str>,
    doc: &PlanDoc,
) -> anyhow::Result<String> {
    let plan_id = Uuid::new_v4().to_string();
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO plans(id, owner_id, title, description, category, difficulty,
                           due_date, created_at, archived, warning, category_mismatch)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        (
            &plan_id,
            owner_id,
            &doc.title,
            &doc.description,
            category,
            difficulty,
            due_date,
            now_iso(),
            doc.warning.as_deref(),
            doc.category_mismatch.as_deref(),
        ),
    )?;

    for (i, p) in doc.phases.iter().enumerate() {
        tx.execute(
            "INSERT INTO plan_phases(id, plan_id, name, date, detail, sort_order)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &plan_id,
                &p.name,
                &p.date,
                &p.desc,
                i as i64,
            ),
        )?;
    }
    for (i, h) in doc.habits.iter().enumerate() {
        tx.execute(
            "INSERT INTO plan_habits(plan_id, sort_order, habit) VALUES(?, ?, ?)",
            (&plan_id, i as i64, h),
        )?;
    }
    for (i, h) in doc.hurdles.iter().enumerate() {
        tx.execute(
            "INSERT INTO plan_hurdles(plan_id, sort_order, issue, solution)
             VALUES(?, ?, ?, ?)",
            (&plan_id, i as i64, &h.issue, &h.sol),
        )?;
    }
    for (i, r) in doc.resources.iter().enumerate() {
        tx.execute(
            "INSERT INTO plan_resources(plan_id, sort_order, kind, price, name, detail, link)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                &plan_id,
                i as i64,
                &r.kind,
                &r.price,
                &r.name,
                &r.desc,
                r.link.as_deref(),
            ),
        )?;
    }
    for (i, s) in doc.timetable.iter().enumerate() {
        tx.execute(
            "INSERT INTO timetable_slots(plan_id, sort_order, time_label, task, completed)
             VALUES(?, ?, ?, ?, ?)",
            (&plan_id, i as i64, &s.time, &s.task, s.completed as i64),
        )?;
    }

    tx.commit()?;
    Ok(plan_id)
}

pub fn load_plan(conn: &Connection, plan_id: &str) -> anyhow::Result<Option<StoredPlan>> {
    let head = conn
        .query_row(
            "SELECT owner_id, title, description, category, difficulty, due_date,
                    created_at, archived, warning, category_mismatch
             FROM plans WHERE id = ?",
            [plan_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, Option<String>>(5)?,
                    r.get::<_, String>(6)?,
                    r.get::<_, i64>(7)? != 0,
                    r.get::<_, Option<String>>(8)?,
                    r.get::<_, Option<String>>(9)?,
                ))
            },
        )
        .optional()?;
    let Some((
        owner_id,
        title,
        description,
        category,
        difficulty,
        due_date,
        created_at,
        archived,
        warning,
        category_mismatch,
    )) = head
    else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT name, date, detail FROM plan_phases WHERE plan_id = ? ORDER BY sort_order",
    )?;
    let phases = stmt
        .query_map([plan_id], |r| {
            Ok(Phase {
                name: r.get(0)?,
                date: r.get(1)?,
                desc: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt =
        conn.prepare("SELECT habit FROM plan_habits WHERE plan_id = ? ORDER BY sort_order")?;
    let habits = stmt
        .query_map([plan_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT issue, solution FROM plan_hurdles WHERE plan_id = ? ORDER BY sort_order",
    )?;
    let hurdles = stmt
        .query_map([plan_id], |r| {
            Ok(Hurdle {
                issue: r.get(0)?,
                sol: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT kind, price, name, detail, link FROM plan_resources
         WHERE plan_id = ? ORDER BY sort_order",
    )?;
    let resources = stmt
        .query_map([plan_id], |r| {
            Ok(Resource {
                kind: r.get(0)?,
                price: r.get(1)?,
                name: r.get(2)?,
                desc: r.get(3)?,
                link: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let slots = timetable::load_slots(conn, plan_id)?;

    Ok(Some(StoredPlan {
        id: plan_id.to_string(),
        owner_id,
        category,
        difficulty,
        due_date,
        created_at,
        archived,
        doc: PlanDoc {
            title,
            description,
            warning,
            category_mismatch,
            phases,
            habits,
            hurdles,
            resources,
            timetable: slots,
        },
    }))
}

pub fn plan_json(plan: &StoredPlan) -> serde_json::Value {
    let mut v = serde_json::to_value(&plan.doc).unwrap_or_else(|_| json!({}));
    v["id"] = json!(plan.id);
    v["ownerId"] = json!(plan.owner_id);
    v["category"] = json!(plan.category);
    v["difficulty"] = json!(plan.difficulty);
    v["dueDate"] = json!(plan.due_date);
    v["createdAt"] = json!(plan.created_at);
    v["archived"] = json!(plan.archived);
    v
}

fn handle_plans_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let owner_id = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let include_archived = optional_bool(req, "includeArchived");

    let sql = if include_archived {
        "SELECT id, title, category, difficulty, due_date, created_at, archived
         FROM plans WHERE owner_id = ? ORDER BY created_at DESC"
    } else {
        "SELECT id, title, category, difficulty, due_date, created_at, archived
         FROM plans WHERE owner_id = ? AND archived = 0 ORDER BY created_at DESC"
    };
    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&owner_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "title": r.get::<_, String>(1)?,
                "category": r.get::<_, String>(2)?,
                "difficulty": r.get::<_, String>(3)?,
                "dueDate": r.get::<_, Option<String>>(4)?,
                "createdAt": r.get::<_, String>(5)?,
                "archived": r.get::<_, i64>(6)? != 0,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(plans) => ok(&req.id, json!({ "plans": plans })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_plans_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let plan_id = match required_str(req, "planId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match load_plan(conn, &plan_id) {
        Ok(Some(plan)) => ok(&req.id, json!({ "plan": plan_json(&plan) })),
        Ok(None) => err(&req.id, "not_found", "plan not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_plans_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let owner_id = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(raw) = req.params.get("plan").cloned() else {
        return err(&req.id, "bad_params", "missing plan", None);
    };
    let doc = match model::parse_plan_doc(raw) {
        Ok(d) => d,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    let category = optional_str(req, "category").unwrap_or_default();
    let difficulty = optional_str(req, "difficulty").unwrap_or_default();
    let due_date = optional_str(req, "dueDate");

    match insert_plan(
        conn,
        &owner_id,
        &category,
        &difficulty,
        due_date.as_deref(),
        &doc,
    ) {
        Ok(plan_id) => ok(&req.id, json!({ "planId": plan_id, "title": doc.title })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "plans" })),
        ),
    }
}

fn set_archived(state: &mut AppState, req: &Request, archived: bool) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let plan_id = match required_str(req, "planId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match conn.execute(
        "UPDATE plans SET archived = ? WHERE id = ?",
        (archived as i64, &plan_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "plan not found", None),
        Ok(_) => ok(&req.id, json!({ "planId": plan_id, "archived": archived })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_plans_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let plan_id = match required_str(req, "planId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match plan_exists(conn, &plan_id) {
        Ok(false) => return err(&req.id, "not_found", "plan not found", None),
        Ok(true) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Explicit delete order (no ON DELETE CASCADE), children before the plan.
    for (table, sql) in [
        (
            "timetable_slots",
            "DELETE FROM timetable_slots WHERE plan_id = ?",
        ),
        ("plan_phases", "DELETE FROM plan_phases WHERE plan_id = ?"),
        ("plan_habits", "DELETE FROM plan_habits WHERE plan_id = ?"),
        ("plan_hurdles", "DELETE FROM plan_hurdles WHERE plan_id = ?"),
        (
            "plan_resources",
            "DELETE FROM plan_resources WHERE plan_id = ?",
        ),
        (
            "progress_days",
            "DELETE FROM progress_days WHERE plan_id = ?",
        ),
        ("plans", "DELETE FROM plans WHERE id = ?"),
    ] {
        if let Err(e) = tx.execute(sql, [&plan_id]) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": table })),
            );
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "plans.list" => Some(handle_plans_list(state, req)),
        "plans.get" => Some(handle_plans_get(state, req)),
        "plans.create" => Some(handle_plans_create(state, req)),
        "plans.archive" => Some(set_archived(state, req, true)),
        "plans.unarchive" => Some(set_archived(state, req, false)),
        "plans.delete" => Some(handle_plans_delete(state, req)),
        _ => None,
    }
}
