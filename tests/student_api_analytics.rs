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

fn write_rosters(workspace: &PathBuf, rosters: &[&str]) {
    let config = json!({ "rosters": rosters });
    std::fs::write(
        workspace.join("rosters.json"),
        serde_json::to_string_pretty(&config).expect("encode rosters"),
    )
    .expect("write rosters.json");
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_paperclipd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn paperclipd");
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
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn setup(workspace: &PathBuf, stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed",
        "roster.addStudent",
        json!({
            "roster": "students_teacher1",
            "lrn": "100000000001",
            "name": "Ana Reyes",
            "password": "pw-123"
        }),
    );
}

fn analytics(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    lrn: &str,
) -> serde_json::Value {
    request_ok(
        stdin,
        reader,
        id,
        "student.getAnalytics",
        json!({ "roster": "students_teacher1", "lrn": lrn }),
    )
}

#[test]
fn repeated_single_deltas_accumulate_exactly() {
    let workspace = temp_dir("paperclip-delta-accumulate");
    write_rosters(&workspace, &["students_teacher1"]);
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    setup(&workspace, &mut stdin, &mut reader);

    for i in 0..3 {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("d{}", i),
            "student.updateAnalytics",
            json!({
                "roster": "students_teacher1",
                "lrn": "100000000001",
                "screenshotsTakenDelta": 1,
                "timesExitedDelta": 0,
                "keyboardUsedDelta": 0
            }),
        );
    }

    let result = analytics(&mut stdin, &mut reader, "g1", "100000000001");
    assert_eq!(result.get("found").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        result.get("screenshotsTaken").and_then(|v| v.as_i64()),
        Some(3)
    );
    assert_eq!(result.get("timesExited").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(result.get("keyboardUsed").and_then(|v| v.as_i64()), Some(0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn absent_student_gets_zero_counts_with_a_not_found_flag() {
    let workspace = temp_dir("paperclip-analytics-missing");
    write_rosters(&workspace, &["students_teacher1"]);
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    setup(&workspace, &mut stdin, &mut reader);

    let result = analytics(&mut stdin, &mut reader, "g1", "999999999999");
    assert_eq!(result.get("found").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        result.get("screenshotsTaken").and_then(|v| v.as_i64()),
        Some(0)
    );
    assert_eq!(result.get("timesExited").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(result.get("keyboardUsed").and_then(|v| v.as_i64()), Some(0));

    // A present student with all-zero counts reports found=true: the two
    // cases stay distinguishable.
    let present = analytics(&mut stdin, &mut reader, "g2", "100000000001");
    assert_eq!(present.get("found").and_then(|v| v.as_bool()), Some(true));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn delta_update_for_unknown_lrn_is_not_found() {
    let workspace = temp_dir("paperclip-delta-missing");
    write_rosters(&workspace, &["students_teacher1"]);
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    setup(&workspace, &mut stdin, &mut reader);

    let resp = request(
        &mut stdin,
        &mut reader,
        "d1",
        "student.updateAnalytics",
        json!({
            "roster": "students_teacher1",
            "lrn": "999999999999",
            "screenshotsTakenDelta": 1,
            "timesExitedDelta": 0,
            "keyboardUsedDelta": 0
        }),
    );
    assert_eq!(error_code(&resp), "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn non_integer_deltas_are_rejected() {
    let workspace = temp_dir("paperclip-delta-validation");
    write_rosters(&workspace, &["students_teacher1"]);
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    setup(&workspace, &mut stdin, &mut reader);

    let resp = request(
        &mut stdin,
        &mut reader,
        "d1",
        "student.updateAnalytics",
        json!({
            "roster": "students_teacher1",
            "lrn": "100000000001",
            "screenshotsTakenDelta": "one",
            "timesExitedDelta": 0,
            "keyboardUsedDelta": 0
        }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    // Numeric strings are accepted; the student client posts form fields.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "d2",
        "student.updateAnalytics",
        json!({
            "roster": "students_teacher1",
            "lrn": "100000000001",
            "screenshotsTakenDelta": "2",
            "timesExitedDelta": "0",
            "keyboardUsedDelta": "0"
        }),
    );
    let result = analytics(&mut stdin, &mut reader, "g1", "100000000001");
    assert_eq!(
        result.get("screenshotsTaken").and_then(|v| v.as_i64()),
        Some(2)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn counters_never_go_below_zero() {
    let workspace = temp_dir("paperclip-delta-clamp");
    write_rosters(&workspace, &["students_teacher1"]);
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    setup(&workspace, &mut stdin, &mut reader);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "d1",
        "student.updateAnalytics",
        json!({
            "roster": "students_teacher1",
            "lrn": "100000000001",
            "screenshotsTakenDelta": -5,
            "timesExitedDelta": 1,
            "keyboardUsedDelta": 0
        }),
    );
    let result = analytics(&mut stdin, &mut reader, "g1", "100000000001");
    assert_eq!(
        result.get("screenshotsTaken").and_then(|v| v.as_i64()),
        Some(0)
    );
    assert_eq!(result.get("timesExited").and_then(|v| v.as_i64()), Some(1));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn heartbeat_acknowledges_without_persisting_anything() {
    let workspace = temp_dir("paperclip-heartbeat");
    write_rosters(&workspace, &["students_teacher1"]);
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    setup(&workspace, &mut stdin, &mut reader);

    let before = analytics(&mut stdin, &mut reader, "g1", "100000000001");
    let ack = request_ok(
        &mut stdin,
        &mut reader,
        "h1",
        "student.backgroundHeartbeat",
        json!({
            "roster": "students_teacher1",
            "lrn": "100000000001",
            "status": "background"
        }),
    );
    let message = ack.get("message").and_then(|v| v.as_str()).expect("ack");
    assert!(message.contains("100000000001"));
    assert!(message.contains("background"));

    let after = analytics(&mut stdin, &mut reader, "g2", "100000000001");
    assert_eq!(before, after);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
