mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("schoold-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health["workspacePath"].is_null());

    // Pure computations work before a workspace is chosen.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grading.resolve",
        json!({ "percentage": 50 }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "3", "timetables.list", json!({}));
    assert_eq!(listed["timetables"], json!([]));

    let needs_ws = request(
        &mut stdin,
        &mut reader,
        "4",
        "timetables.create",
        json!({ "name": "S1", "periods": ["P1"] }),
    );
    assert_eq!(error_code(&needs_ws), "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert!(workspace.join("schoold.sqlite3").is_file());

    let families = [
        ("grading.config.get", json!({})),
        ("grading.rank", json!({ "entries": [] })),
        ("grading.aggregate", json!({ "subjects": [] })),
        ("reports.class", json!({ "scores": [] })),
        ("marks.matrix", json!({ "questions": [], "scores": [] })),
        ("timetable.clashes", json!({})),
    ];
    for (i, (method, params)) in families.iter().enumerate() {
        let id = format!("f{}", i);
        let _ = request_ok(&mut stdin, &mut reader, &id, method, params.clone());
    }

    let unknown = request(&mut stdin, &mut reader, "6", "grades.bogus", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    let bad = request(&mut stdin, &mut reader, "7", "grading.rank", json!({ "entries": 3 }));
    assert_eq!(error_code(&bad), "bad_params");

    let _ = child.kill();
}

#[test]
fn malformed_json_line_gets_bad_json_and_loop_continues() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(error_code(&value), "bad_json");

    let _ = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = child.kill();
}
