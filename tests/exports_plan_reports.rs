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

fn create_plan(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> String {
    let created = request_ok(
        stdin,
        reader,
        "c1",
        "plans.create",
        json!({
            "ownerId": "u1",
            "category": "Fitness",
            "difficulty": "Hard",
            "plan": {
                "title": "Marathon Prep",
                "description": "Ten months to race day.",
                "warning": "Timeline is tight for a first marathon.",
                "phases": [{"name": "Base building", "date": "2026-10-01", "desc": "Easy mileage"}],
                "habits": ["Run before work"],
                "hurdles": [{"issue": "Knee pain", "sol": "Strength work twice a week"}],
                "resources": [{"type": "BOOK", "price": "Free", "name": "Plan 101", "desc": "Basics"}],
                "timetable": [
                    {"time": "6:00 AM", "task": "Run", "completed": true},
                    {"time": "9:00 PM", "task": "Stretch", "completed": false}
                ]
            }
        }),
    );
    created["planId"].as_str().expect("planId").to_string()
}

#[test]
fn plan_text_export_writes_a_readable_report() {
    let workspace = temp_dir("straxian-export-text");
    let out = workspace.join("reports").join("plan.txt");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let plan_id = create_plan(&mut stdin, &mut reader);

    let written = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "export.planText",
        json!({ "planId": plan_id, "outPath": out.to_string_lossy() }),
    );
    assert!(written["bytes"].as_u64().unwrap_or(0) > 0);

    let text = std::fs::read_to_string(&out).expect("read export");
    assert!(text.starts_with(&format!("Marathon Prep\n{}\n", "=".repeat("Marathon Prep".len()))));
    assert!(text.contains("Strategic Milestones"));
    assert!(text.contains("Daily Timetable"));
    assert!(text.contains("[x] 6:00 AM"));
    assert!(text.contains("[ ] 9:00 PM"));
    assert!(text.contains("Knee pain"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn plan_json_export_is_parseable_and_complete() {
    let workspace = temp_dir("straxian-export-json");
    let out = workspace.join("plan.json");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let plan_id = create_plan(&mut stdin, &mut reader);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "export.planJson",
        json!({ "planId": plan_id, "outPath": out.to_string_lossy() }),
    );
    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).expect("read export"))
            .expect("export parses");
    assert_eq!(exported["id"], plan_id.as_str());
    assert_eq!(exported["title"], "Marathon Prep");
    assert_eq!(exported["timetable"][0]["time"], "6:00 AM");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn plan_model_report_flags_tight_timelines() {
    let workspace = temp_dir("straxian-report-model");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let plan_id = create_plan(&mut stdin, &mut reader);

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.planModel",
        json!({ "planId": plan_id }),
    );
    let model = &report["model"];
    assert_eq!(model["overview"]["title"], "Marathon Prep");
    assert_eq!(model["overview"]["tone"], "AMBITIOUS");
    assert_eq!(model["milestones"][0]["number"], 1);
    assert_eq!(model["milestones"][0]["name"], "Base building");
    assert_eq!(model["timetable"].as_array().map(|a| a.len()), Some(2));

    let missing = request(
        &mut stdin,
        &mut reader,
        "3",
        "reports.planModel",
        json!({ "planId": "no-such-plan" }),
    );
    assert_eq!(missing["error"]["code"], "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
