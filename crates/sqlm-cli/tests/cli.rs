//! Runs the `sqlm` binary against an on-disk store

use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const CONFIG: &str = r#"
store:
  path: "people.duckdb"
models:
  - table: people
    fields:
      - { name: id, type: int, primary_key: true }
      - { name: name, type: text, nullable: false }
      - { name: age, type: int }
"#;

fn sqlm(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sqlm"))
        .current_dir(dir)
        .env_remove("SQLM_DATABASE")
        .env_remove("SQLM_CONFIG")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .unwrap()
}

fn json_out(dir: &Path, args: &[&str]) -> Value {
    let out = sqlm(dir, args);
    assert!(
        out.status.success(),
        "sqlm {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).unwrap()
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sqlm.yaml"), CONFIG).unwrap();
    dir
}

#[test]
fn test_init_and_crud() {
    let dir = workspace();
    let dir = dir.path();

    assert_eq!(json_out(dir, &["init"]), json!({"tables": ["people"]}));

    json_out(dir, &["create", "people", r#"{"id": 1, "name": "Ann", "age": 30}"#]);
    json_out(dir, &["create", "people", r#"{"id": 2, "name": "Bob", "age": 17}"#]);

    assert_eq!(
        json_out(dir, &["get", "people", "1"]),
        json!({"id": 1, "name": "Ann", "age": 30})
    );
    assert_eq!(
        json_out(dir, &["list", "people", "age[gte]=18"]),
        json!([{"id": 1, "name": "Ann", "age": 30}])
    );
    assert_eq!(
        json_out(
            dir,
            &["find", "people", "--filter", r#"{"age": {"$lt": 18}}"#, "--projection", "name"]
        ),
        json!([{"name": "Bob"}])
    );
    assert_eq!(
        json_out(dir, &["patch", "people", "2", r#"{"age": 18}"#]),
        json!({"id": 2, "name": "Bob", "age": 18})
    );
    assert_eq!(
        json_out(dir, &["put", "people", "2", r#"{"name": "Rob"}"#]),
        json!({"id": 2, "name": "Rob", "age": null})
    );
    json_out(dir, &["delete", "people", "1"]);
    assert_eq!(
        json_out(dir, &["list", "people", "order_by=-id"]),
        json!([{"id": 2, "name": "Rob", "age": null}])
    );
}

#[test]
fn test_client_errors_exit_with_2() {
    let dir = workspace();
    let dir = dir.path();
    json_out(dir, &["init"]);

    let missing = sqlm(dir, &["get", "people", "99"]);
    assert_eq!(missing.status.code(), Some(2));

    let unknown_field = sqlm(dir, &["list", "people", "email=x"]);
    assert_eq!(unknown_field.status.code(), Some(2));

    let unknown_model = sqlm(dir, &["list", "pets"]);
    assert_eq!(unknown_model.status.code(), Some(2));
}

#[test]
fn test_put_upserts_and_reports_unchanged_writes() {
    let dir = workspace();
    let dir = dir.path();
    json_out(dir, &["init"]);

    assert_eq!(
        json_out(dir, &["put", "people", "7", r#"{"name": "Eve", "age": 40}"#]),
        json!({"id": 7, "name": "Eve", "age": 40})
    );
    assert_eq!(
        json_out(dir, &["get", "people", "7"]),
        json!({"id": 7, "name": "Eve", "age": 40})
    );

    let unchanged = json!({"modified": false, "record": {"id": 7, "name": "Eve", "age": 40}});
    assert_eq!(json_out(dir, &["patch", "people", "7", r#"{"age": 40}"#]), unchanged);
    assert_eq!(
        json_out(dir, &["put", "people", "7", r#"{"name": "Eve", "age": 40}"#]),
        unchanged
    );

    // Nulling a required field is the caller's mistake
    let nulled = sqlm(dir, &["patch", "people", "7", r#"{"name": null}"#]);
    assert_eq!(nulled.status.code(), Some(2));
    let nameless = sqlm(dir, &["create", "people", r#"{"id": 8, "age": 1}"#]);
    assert_eq!(nameless.status.code(), Some(2));

    let paged = sqlm(dir, &["list", "people", "limit=18446744073709551615"]);
    assert_eq!(paged.status.code(), Some(2));
}
