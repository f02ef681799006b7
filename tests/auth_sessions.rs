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

/// Sidecar arguments for each storage backend.
fn backend_args(prefix: &str) -> Vec<Vec<String>> {
    let db = temp_dir(prefix).join("portal.sqlite3");
    vec![
        vec!["--stdio".to_string(), "--memory".to_string()],
        vec![
            "--stdio".to_string(),
            "--db".to_string(),
            db.to_string_lossy().to_string(),
        ],
    ]
}

fn spawn_sidecar(args: &[String]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_portald");
    let mut child = Command::new(exe)
        .args(args)
        .env_remove("PORTAL_DB")
        .env_remove("PORTAL_SESSION_TTL")
        .env_remove("PORTAL_ADMIN_PASSWORD")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn portald");
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
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(json!(null))
}

#[test]
fn login_issues_a_token_that_resolves_until_logout() {
    for args in backend_args("portald-auth-session") {
        let (mut child, mut stdin, mut reader) = spawn_sidecar(&args);

        let login = request_ok(&mut stdin, &mut reader, "1", "auth.login", json!({ "id": "admin", "password": "admin123", "role": "admin" }));
        let token = login["token"].as_str().expect("token").to_string();
        assert_eq!(login["expiresIn"], 28_800);

        let session = request_ok(&mut stdin, &mut reader, "2", "auth.session", json!({ "token": token }));
        assert_eq!(session["success"], true);
        assert_eq!(session["user"], json!({ "id": "admin", "name": "Administrator", "role": "admin" }));
        assert!(session["expiresIn"].as_u64().expect("expiresIn") <= 28_800);

        let out = request_ok(&mut stdin, &mut reader, "3", "auth.logout", json!({ "token": token }));
        assert_eq!(out, json!({ "success": true }));
        let gone = request_ok(&mut stdin, &mut reader, "4", "auth.session", json!({ "token": token }));
        assert_eq!(gone, json!({ "success": false, "message": "Session expired" }));

        let missing = request_ok(&mut stdin, &mut reader, "5", "auth.login", json!({ "id": "admin", "role": "admin" }));
        assert_eq!(missing, json!({ "success": false, "message": "missing password" }));

        drop(stdin);
        let _ = child.wait();
    }
}

#[test]
fn expired_sessions_do_not_resolve() {
    let args = vec![
        "--stdio".to_string(),
        "--memory".to_string(),
        "--session-ttl-secs".to_string(),
        "0".to_string(),
    ];
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&args);

    let login = request_ok(&mut stdin, &mut reader, "1", "auth.login", json!({ "id": "admin", "password": "admin123", "role": "admin" }));
    assert_eq!(login["success"], true);
    assert_eq!(login["expiresIn"], 0);
    let session = request_ok(&mut stdin, &mut reader, "2", "auth.session", json!({ "token": login["token"] }));
    assert_eq!(session["success"], false);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn admin_password_comes_from_config() {
    let args = vec![
        "--stdio".to_string(),
        "--memory".to_string(),
        "--admin-password".to_string(),
        "s3cret".to_string(),
    ];
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&args);

    let default = request_ok(&mut stdin, &mut reader, "1", "auth.login", json!({ "id": "admin", "password": "admin123", "role": "admin" }));
    assert_eq!(default["success"], false);
    let configured = request_ok(&mut stdin, &mut reader, "2", "auth.login", json!({ "id": "admin", "password": "s3cret", "role": "admin" }));
    assert_eq!(configured["success"], true);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn huge_session_ttl_is_clamped_instead_of_crashing() {
    let args = vec![
        "--stdio".to_string(),
        "--memory".to_string(),
        "--session-ttl-secs".to_string(),
        u64::MAX.to_string(),
    ];
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&args);

    let login = request_ok(&mut stdin, &mut reader, "1", "auth.login", json!({ "id": "admin", "password": "admin123", "role": "admin" }));
    assert_eq!(login["success"], true);
    assert_eq!(login["expiresIn"], 365 * 24 * 60 * 60);
    let session = request_ok(&mut stdin, &mut reader, "2", "auth.session", json!({ "token": login["token"] }));
    assert_eq!(session["success"], true);

    drop(stdin);
    let _ = child.wait();
}
