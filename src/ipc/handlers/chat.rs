use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_iso, required_str};
use crate::ipc::types::{AppState, Request};
use crate::{autopsy, llm, prompt};

use super::progress;

const AUTOPSY_WINDOW_DAYS: usize = 7;
const ASSISTANT_CONTEXT_ROWS: usize = 5;
const ASSISTANT_APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

fn handle_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, user_message, ai_response, created_at
         FROM chat_sessions WHERE user_id = ? ORDER BY created_at",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&user_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "userMessage": r.get::<_, String>(1)?,
                "aiResponse": r.get::<_, String>(2)?,
                "timestamp": r.get::<_, String>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(messages) => ok(&req.id, json!({ "messages": messages })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

/// Progress context from the user's newest active plan, or a placeholder
/// when they have none. Both the LLM prompt and the fallback classifier
/// consume this block.
fn autopsy_context(conn: &Connection, user_id: &str) -> anyhow::Result<String> {
    let newest: Option<String> = conn
        .query_row(
            "SELECT id FROM plans WHERE owner_id = ? AND archived = 0
             ORDER BY created_at DESC LIMIT 1",
            [user_id],
            |r| r.get(0),
        )
        .optional()?;
    match newest {
        Some(plan_id) => {
            let summary = progress::summarize(conn, &plan_id, AUTOPSY_WINDOW_DAYS)?;
            Ok(summary.context_block())
        }
        None => Ok("No plan data available.".to_string()),
    }
}

/// Append-only session log. A failed write must not cost the user their
/// response, so it is logged and swallowed.
fn append_session(conn: &Connection, user_id: &str, user_message: &str, ai_response: &str) {
    let result = conn.execute(
        "INSERT INTO chat_sessions(id, user_id, user_message, ai_response, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (
            Uuid::new_v4().to_string(),
            user_id,
            user_message,
            ai_response,
            now_iso(),
        ),
    );
    if let Err(e) = result {
        warn!(error = %e, "failed to append chat session");
    }
}

fn handle_send(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let message = match required_str(req, "message") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if message.trim().is_empty() {
        return err(&req.id, "bad_params", "message must not be empty", None);
    }

    let context = match autopsy_context(conn, &user_id) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let (response, source) = match llm::generate_text(&prompt::goal_autopsy(&message, &context)) {
        Ok(text) => (text, "llm"),
        Err(e) => {
            // The user is never left without an autopsy; the local decision
            // table answers from the same context block.
            warn!(error = %e, "autopsy relay failed, using local classifier");
            (autopsy::report(&context), "fallback")
        }
    };

    append_session(conn, &user_id, &message, &response);
    ok(&req.id, json!({ "response": response, "source": source }))
}

fn assistant_context(conn: &Connection, user_id: &str) -> anyhow::Result<String> {
    let mut stmt = conn.prepare(
        "SELECT user_message, ai_response FROM chat_sessions
         WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
    )?;
    let mut rows = stmt
        .query_map((user_id, ASSISTANT_CONTEXT_ROWS as i64), |r| {
            Ok(format!(
                "User: {}\nAI: {}",
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Ok("No user context available.".to_string());
    }
    rows.reverse();
    Ok(rows.join("\n\n"))
}

fn handle_assistant(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let message = match required_str(req, "message") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if message.trim().is_empty() {
        return err(&req.id, "bad_params", "message must not be empty", None);
    }

    // Edit-style requests never reach the network.
    if prompt::is_edit_request(&message) {
        append_session(conn, &user_id, &message, prompt::ASSISTANT_EDIT_REFUSAL);
        return ok(
            &req.id,
            json!({ "response": prompt::ASSISTANT_EDIT_REFUSAL, "source": "guard" }),
        );
    }

    let context = match assistant_context(conn, &user_id) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let (response, source) = match llm::generate_text(&prompt::assistant(&context, &message)) {
        Ok(text) => (text, "llm"),
        Err(e) => {
            warn!(error = %e, "assistant relay failed");
            (ASSISTANT_APOLOGY.to_string(), "fallback")
        }
    };

    append_session(conn, &user_id, &message, &response);
    ok(&req.id, json!({ "response": response, "source": source }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "chat.history" => Some(handle_history(state, req)),
        "chat.send" => Some(handle_send(state, req)),
        "assistant.ask" => Some(handle_assistant(state, req)),
        _ => None,
    }
}
