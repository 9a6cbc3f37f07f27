// CLI integration tests for the document flows.
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{Value, json};

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_colmap");
    Command::new(exe)
}

struct Fixture {
    _temp: tempfile::TempDir,
    store: PathBuf,
    schema: PathBuf,
}

fn fixture(schema: Value) -> Fixture {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = temp.path().join("store.json");
    let schema_path = temp.path().join("schema.json");
    std::fs::write(&schema_path, schema.to_string()).expect("write schema");
    Fixture {
        _temp: temp,
        store,
        schema: schema_path,
    }
}

fn users() -> Fixture {
    fixture(json!({
        "collection": "users",
        "namespace": "app",
        "fields": [
            {"name": "id", "type": "text", "role": "key"},
            {"name": "name", "type": "text"},
            {"name": "role", "type": {"enum": {"name": "Role", "members": ["ADMIN", "MEMBER"]}}}
        ]
    }))
}

fn run(fixture: &Fixture, args: &[&str]) -> Output {
    run_with(&fixture.store, &fixture.schema, args)
}

fn run_with(store: &Path, schema: &Path, args: &[&str]) -> Output {
    cmd()
        .arg("--store")
        .arg(store)
        .arg("--schema")
        .arg(schema)
        .args(args)
        .output()
        .expect("run colmap")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout json")
}

fn stderr_json(output: &Output) -> Value {
    let text = String::from_utf8_lossy(&output.stderr);
    let line = text.lines().last().expect("stderr line");
    serde_json::from_str(line).expect("stderr json")
}

#[test]
fn put_get_range_delete_flow() {
    let users = users();

    let put = stdout_json(&run(&users, &["put", r#"{"id":"u1","name":"Ada","role":"ADMIN"}"#]));
    assert_eq!(put, json!({"inserted": "u1"}));
    stdout_json(&run(&users, &["put", r#"{"id":"u2","name":"Bob","role":"MEMBER"}"#]));

    let got = stdout_json(&run(&users, &["get", "u1"]));
    assert_eq!(got, json!({"id": "u1", "name": "Ada", "role": "ADMIN"}));

    let range = stdout_json(&run(&users, &["range", "u1", "u2"]));
    let ids = range
        .as_array()
        .expect("array")
        .iter()
        .map(|user| user["id"].as_str().expect("id"))
        .collect::<Vec<_>>();
    assert_eq!(ids, ["u1", "u2"]);

    let many = stdout_json(&run(&users, &["get-many", "u2", "ghost"]));
    assert_eq!(many, json!([{"id": "u2", "name": "Bob", "role": "MEMBER"}]));

    let deleted = stdout_json(&run(&users, &["delete", "u1"]));
    assert_eq!(deleted, json!({"deleted": "u1"}));

    let ghost = run(&users, &["get", "u1"]);
    assert_eq!(ghost.status.code(), Some(3));
    assert_eq!(stderr_json(&ghost)["error"]["kind"], "NotFound");
}

#[test]
fn range_limit_is_applied() {
    let users = users();
    for id in ["a", "b", "c"] {
        let record = json!({"id": id, "name": id}).to_string();
        stdout_json(&run(&users, &["put", &record]));
    }
    let range = stdout_json(&run(&users, &["range", "", "", "--limit", "2"]));
    assert_eq!(range.as_array().expect("array").len(), 2);
}

#[test]
fn empty_key_is_rejected_with_missing_key() {
    let users = users();
    let output = run(&users, &["put", r#"{"id":"","name":"Nobody"}"#]);
    assert_eq!(output.status.code(), Some(10));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"], "MissingKey");
    assert_eq!(err["error"]["field"], "id");
    assert!(!users.store.exists() || std::fs::read(&users.store).expect("read").is_empty());
}

#[test]
fn bad_record_json_is_usage_error() {
    let users = users();
    let output = run(&users, &["put", "{nope"]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stderr_json(&output)["error"]["kind"], "Usage");

    let output = run(&users, &["put", r#"{"id":"u1","nick":"x"}"#]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stderr_json(&output)["error"]["field"], "nick");
}

#[test]
fn schema_without_key_exits_with_schema_code() {
    let keyless = fixture(json!({
        "collection": "things",
        "namespace": "app",
        "fields": [{"name": "name", "type": "text"}]
    }));
    let output = run(&keyless, &["get", "x"]);
    assert_eq!(output.status.code(), Some(4));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"], "Schema");
    assert!(err["error"]["hint"].is_string());
}

#[test]
fn super_column_flow() {
    let comments = fixture(json!({
        "collection": "comments",
        "namespace": "app",
        "fields": [
            {"name": "post", "type": "text", "role": "key"},
            {"name": "comment_id", "type": "text", "role": "super_column"},
            {"name": "body", "type": "text"}
        ]
    }));
    for (id, body) in [("c1", "first"), ("c2", "second")] {
        let record = json!({"post": "p1", "comment_id": id, "body": body}).to_string();
        stdout_json(&run(&comments, &["put", &record]));
    }
    let found = stdout_json(&run(&comments, &["get-super", "p1", "c2", "c9"]));
    assert_eq!(
        found,
        json!([{"post": "p1", "comment_id": "c2", "body": "second"}])
    );
}

#[test]
fn serialized_fields_need_allow_flag() {
    let profiles = fixture(json!({
        "collection": "profiles",
        "namespace": "app",
        "fields": [
            {"name": "id", "type": "text", "role": "key"},
            {"name": "prefs", "type": {"serialized": {"name": "Prefs"}}}
        ]
    }));
    let record = r#"{"id":"p1","prefs":{"theme":"dark","sizes":[1,2]}}"#;

    let denied = run(&profiles, &["put", record]);
    assert_eq!(denied.status.code(), Some(9));
    assert_eq!(stderr_json(&denied)["error"]["kind"], "UnmappableType");

    stdout_json(&run(&profiles, &["--allow-serialized", "put", record]));
    let got = stdout_json(&run(&profiles, &["--allow-serialized", "get", "p1"]));
    assert_eq!(got["prefs"], json!({"theme": "dark", "sizes": [1, 2]}));
}

#[test]
fn corrupt_store_reports_store_failure() {
    let users = users();
    std::fs::write(&users.store, b"garbage").expect("write");
    let output = run(&users, &["get", "u1"]);
    assert_eq!(output.status.code(), Some(12));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"], "Store");
    let causes = err["error"]["causes"].as_array().expect("causes");
    assert!(causes[0].as_str().expect("cause").starts_with("Corrupt"));
}
