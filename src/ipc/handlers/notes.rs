use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_iso, optional_str, required_str};
use crate::ipc::types::{AppState, Request};

const DEFAULT_TITLE: &str = "Untitled";

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let owner_id = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, title, content, created_at, updated_at
         FROM notes WHERE owner_id = ? ORDER BY created_at DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&owner_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "title": r.get::<_, String>(1)?,
                "content": r.get::<_, String>(2)?,
                "createdAt": r.get::<_, String>(3)?,
                "updatedAt": r.get::<_, String>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(notes) => ok(&req.id, json!({ "notes": notes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn note_title(req: &Request) -> String {
    let title = optional_str(req, "title").unwrap_or_default();
    let title = title.trim();
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title.to_string()
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let owner_id = match required_str(req, "ownerId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let content = match required_str(req, "content") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if content.trim().is_empty() {
        return err(&req.id, "bad_params", "note cannot be empty", None);
    }

    let note_id = Uuid::new_v4().to_string();
    let now = now_iso();
    if let Err(e) = conn.execute(
        "INSERT INTO notes(id, owner_id, title, content, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&note_id, &owner_id, note_title(req), &content, &now, &now),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "notes" })),
        );
    }
    ok(&req.id, json!({ "noteId": note_id, "updatedAt": now }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let note_id = match required_str(req, "noteId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let content = match required_str(req, "content") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if content.trim().is_empty() {
        return err(&req.id, "bad_params", "note cannot be empty", None);
    }

    let now = now_iso();
    match conn.execute(
        "UPDATE notes SET title = ?, content = ?, updated_at = ? WHERE id = ?",
        (note_title(req), &content, &now, &note_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "note not found", None),
        Ok(_) => ok(&req.id, json!({ "noteId": note_id, "updatedAt": now })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let note_id = match required_str(req, "noteId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match conn.execute("DELETE FROM notes WHERE id = ?", [&note_id]) {
        Ok(0) => err(&req.id, "not_found", "note not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notes.list" => Some(handle_list(state, req)),
        "notes.create" => Some(handle_create(state, req)),
        "notes.update" => Some(handle_update(state, req)),
        "notes.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
