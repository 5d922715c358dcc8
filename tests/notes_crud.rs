use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_straxiand");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env_remove("GEMINI_API_KEY")
        .env_remove("STRAXIAND_LLM_BASE_URL")
        .spawn()
        .expect("spawn straxiand");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let resp = request(stdin, reader, id, method, params);
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        resp
    );
    resp.get("result").cloned().expect("result")
}

#[test]
fn notes_crud_lifecycle() {
    let workspace = temp_dir("straxian-notes-crud");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "notes.create",
        json!({ "ownerId": "u1", "content": "first note, no title" }),
    );
    let first_id = first["noteId"].as_str().expect("noteId").to_string();
    // Timestamps have millisecond resolution; keep the two creates apart.
    std::thread::sleep(Duration::from_millis(10));
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "notes.create",
        json!({ "ownerId": "u1", "title": "Reading list", "content": "second note" }),
    );
    let second_id = second["noteId"].as_str().expect("noteId").to_string();

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "notes.list",
        json!({ "ownerId": "u1" }),
    );
    let notes = listed["notes"].as_array().expect("notes array");
    assert_eq!(notes.len(), 2);
    // Newest first; the untitled one falls back to a default title.
    assert_eq!(notes[0]["id"], second_id.as_str());
    assert_eq!(notes[0]["title"], "Reading list");
    assert_eq!(notes[1]["id"], first_id.as_str());
    assert_eq!(notes[1]["title"], "Untitled");

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "notes.update",
        json!({ "noteId": first_id, "title": "Journal", "content": "rewritten" }),
    );
    assert!(updated["updatedAt"].is_string());

    let relisted = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "notes.list",
        json!({ "ownerId": "u1" }),
    );
    let renamed = relisted["notes"]
        .as_array()
        .expect("notes array")
        .iter()
        .find(|n| n["id"] == first_id.as_str())
        .expect("updated note present");
    assert_eq!(renamed["title"], "Journal");
    assert_eq!(renamed["content"], "rewritten");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "notes.delete",
        json!({ "noteId": second_id }),
    );
    let final_list = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "notes.list",
        json!({ "ownerId": "u1" }),
    );
    assert_eq!(final_list["notes"].as_array().map(|a| a.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn notes_reject_empty_content_and_unknown_ids() {
    let workspace = temp_dir("straxian-notes-errors");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let empty = request(
        &mut stdin,
        &mut reader,
        "2",
        "notes.create",
        json!({ "ownerId": "u1", "content": "   " }),
    );
    assert_eq!(empty["error"]["code"], "bad_params");

    let missing_update = request(
        &mut stdin,
        &mut reader,
        "3",
        "notes.update",
        json!({ "noteId": "no-such-note", "content": "text" }),
    );
    assert_eq!(missing_update["error"]["code"], "not_found");

    let missing_delete = request(
        &mut stdin,
        &mut reader,
        "4",
        "notes.delete",
        json!({ "noteId": "no-such-note" }),
    );
    assert_eq!(missing_delete["error"]["code"], "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
