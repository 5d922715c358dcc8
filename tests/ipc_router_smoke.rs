use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

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
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn malformed_request_lines_still_get_a_parseable_reply() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // A bare JSON string is not a request; the serde error text contains
    // double quotes and must not corrupt the reply line.
    writeln!(stdin, "\"abc\"").expect("write raw line");
    stdin.flush().expect("flush raw line");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read reply");
    let value: serde_json::Value =
        serde_json::from_str(line.trim()).expect("reply line parses as JSON");
    assert_eq!(value["ok"], false);
    assert_eq!(value["error"]["code"], "bad_json");

    // The daemon keeps serving after the bad line.
    let health = request(&mut stdin, &mut reader, "after", "health", json!({}));
    assert_eq!(health.get("ok").and_then(|v| v.as_bool()), Some(true));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("straxian-router-smoke");
    let bundle_out = workspace.join("smoke-backup.straxbackup.zip");
    let text_out = workspace.join("smoke-plan.txt");
    let json_out = workspace.join("smoke-plan.json");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request(
        &mut stdin,
        &mut reader,
        "3",
        "plans.create",
        json!({
            "ownerId": "smoke-user",
            "category": "Skill",
            "difficulty": "Medium",
            "dueDate": "2026-12-31",
            "plan": {
                "title": "Smoke Goal",
                "description": "Router smoke plan.",
                "phases": [{"name": "Phase 1", "date": "2026-10-01", "desc": "Start"}],
                "habits": ["Daily review"],
                "hurdles": [{"issue": "Fatigue", "sol": "Shorter sessions"}],
                "resources": [{"type": "BOOK", "price": "Free", "name": "Guide", "desc": "Basics"}],
                "timetable": [{"time": "7:00 AM", "task": "Warm up", "completed": false}]
            }
        }),
    );
    let plan_id = created
        .get("result")
        .and_then(|v| v.get("planId"))
        .and_then(|v| v.as_str())
        .expect("planId")
        .to_string();

    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "plans.list",
        json!({ "ownerId": "smoke-user" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "5",
        "plans.get",
        json!({ "planId": plan_id }),
    );
    // No API key in this environment: plan.generate must fail cleanly, not hang.
    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "plan.generate",
        json!({
            "ownerId": "smoke-user",
            "aim": "Run a marathon",
            "category": "Fitness",
            "difficulty": "Hard",
            "dueDate": "2027-06-01"
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "timetable.get",
        json!({ "planId": plan_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7a",
        "timetable.addSlot",
        json!({ "planId": plan_id, "task": "Stretch", "time": "9:00 PM" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7b",
        "timetable.save",
        json!({
            "planId": plan_id,
            "slots": [
                {"time": "7:00 AM", "task": "Warm up", "completed": false},
                {"time": "9:00 PM", "task": "Stretch", "completed": false}
            ]
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7c",
        "timetable.retime",
        json!({ "planId": plan_id, "index": 0, "time": "6:30 AM" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7d",
        "timetable.move",
        json!({ "planId": plan_id, "from": 0, "to": 1 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7e",
        "timetable.toggleCompleted",
        json!({ "planId": plan_id, "index": 0 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7f",
        "timetable.removeSlot",
        json!({ "planId": plan_id, "index": 0 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "timetable.adapt",
        json!({ "planId": plan_id, "problem": "I keep missing mornings" }),
    );
    let note = request(
        &mut stdin,
        &mut reader,
        "9",
        "notes.create",
        json!({ "ownerId": "smoke-user", "title": "Smoke", "content": "router smoke note" }),
    );
    let note_id = note
        .get("result")
        .and_then(|v| v.get("noteId"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let _ = request(
        &mut stdin,
        &mut reader,
        "9a",
        "notes.list",
        json!({ "ownerId": "smoke-user" }),
    );
    if !note_id.is_empty() {
        let _ = request(
            &mut stdin,
            &mut reader,
            "9b",
            "notes.update",
            json!({ "noteId": note_id, "title": "Smoke", "content": "updated note" }),
        );
        let _ = request(
            &mut stdin,
            &mut reader,
            "9c",
            "notes.delete",
            json!({ "noteId": note_id }),
        );
    }
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "progress.set",
        json!({ "planId": plan_id, "date": "2026-08-27", "status": "completed" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10a",
        "progress.get",
        json!({ "planId": plan_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10b",
        "progress.summary",
        json!({ "planId": plan_id, "recentDays": 7 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "chat.send",
        json!({ "userId": "smoke-user", "message": "Why am I failing?" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "11a",
        "chat.history",
        json!({ "userId": "smoke-user" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "11b",
        "assistant.ask",
        json!({ "userId": "smoke-user", "message": "Summarize my week" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "reports.planModel",
        json!({ "planId": plan_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12a",
        "export.planText",
        json!({ "planId": plan_id, "outPath": text_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12b",
        "export.planJson",
        json!({ "planId": plan_id, "outPath": json_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "13",
        "backup.exportWorkspaceBundle",
        json!({
            "workspacePath": workspace.to_string_lossy(),
            "outPath": bundle_out.to_string_lossy()
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "backup.importWorkspaceBundle",
        json!({
            "workspacePath": workspace.to_string_lossy(),
            "inPath": bundle_out.to_string_lossy()
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "15",
        "plans.archive",
        json!({ "planId": plan_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "16",
        "plans.unarchive",
        json!({ "planId": plan_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "17",
        "plans.delete",
        json!({ "planId": plan_id }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
