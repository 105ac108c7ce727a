//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `dynq` binary against a schema and rows
//! written to a temporary directory, and checks exit codes and output.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const SCHEMA: &str = r#"
element = "Person"

[[enums]]
name = "Role"
members = ["Staff", "Admin"]

[[classes]]
name = "Person"
fields = [
    { name = "Id", type = "Int32" },
    { name = "Name", type = "String" },
    { name = "Age", type = "Int32" },
    { name = "Dept", type = "String" },
    { name = "Kind", type = "Role" },
    { name = "Joined", type = "DateTime" },
    { name = "Bonus", type = "Decimal?" },
]
"#;

const ROWS: &str = r#"[
    { "Id": 1, "Name": "a", "Age": 40, "Dept": "eng", "Kind": "Admin", "Joined": "2019-05-01T09:00:00", "Bonus": "10.5" },
    { "Id": 2, "Name": "b", "Age": 22, "Dept": "ops", "Kind": "Staff", "Joined": "2021-01-15T09:00:00", "Bonus": null },
    { "Id": 3, "Name": "c", "Age": 31, "Dept": "eng", "Kind": "Staff", "Joined": "2022-07-01T09:00:00", "Bonus": "4" }
]"#;

struct Fixture {
    _dir: TempDir,
    schema: PathBuf,
    data: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let schema = dir.path().join("schema.toml");
    let data = dir.path().join("rows.json");
    fs::write(&schema, SCHEMA).unwrap();
    fs::write(&data, ROWS).unwrap();
    Fixture {
        _dir: dir,
        schema,
        data,
    }
}

fn dynq() -> Command {
    cargo_bin_cmd!("dynq")
}

impl Fixture {
    fn query(&self) -> Command {
        let mut cmd = dynq();
        cmd.arg("query")
            .arg("--schema")
            .arg(&self.schema)
            .arg("--data")
            .arg(&self.data);
        cmd
    }

    fn check(&self, expression: &str) -> Command {
        let mut cmd = dynq();
        cmd.arg("check")
            .arg("--schema")
            .arg(&self.schema)
            .arg(expression);
        cmd
    }
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

// ──────────────────────────────────────────────
// Help and version
// ──────────────────────────────────────────────

#[test]
fn help_describes_the_tool() {
    dynq()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("dynamic query expressions"));
}

#[test]
fn version_exits_0() {
    dynq()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dynq"));
}

// ──────────────────────────────────────────────
// query
// ──────────────────────────────────────────────

#[test]
fn where_and_select_produce_projected_rows() {
    let f = fixture();
    let rows = stdout_json(
        f.query()
            .args(["--where", "Id > 1 && Name != \"c\""])
            .args(["--select", "new (Id, Name)"])
            .args(["--output", "json"]),
    );
    assert_eq!(rows, serde_json::json!([{ "Id": 2, "Name": "b" }]));
}

#[test]
fn order_by_descending_then_name() {
    let f = fixture();
    f.query()
        .args(["--order-by", "Dept desc, Age"])
        .args(["--select", "Name"])
        .assert()
        .success()
        .stdout("b\nc\na\n");
}

#[test]
fn group_by_with_aggregates() {
    let f = fixture();
    let rows = stdout_json(
        f.query()
            .args(["--group-by", "Dept"])
            .args(["--select", "new (Key as Dept, Count() as N, Max(Age) as Oldest)"])
            .args(["--output", "json"]),
    );
    assert_eq!(
        rows,
        serde_json::json!([
            { "Dept": "eng", "N": 2, "Oldest": 40 },
            { "Dept": "ops", "N": 1, "Oldest": 22 },
        ])
    );
}

#[test]
fn arguments_and_count() {
    let f = fixture();
    f.query()
        .args(["--where", "Age > @0 && Dept == minDept"])
        .args(["--arg", "25"])
        .args(["--named", "minDept=\"eng\""])
        .arg("--count")
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn enums_dates_and_nullables() {
    let f = fixture();
    f.query()
        .args(["--where", "Kind == \"Staff\" && Joined.Year >= 2021"])
        .args(["--where", "Bonus == null || Bonus > 1"])
        .args(["--select", "Id"])
        .assert()
        .success()
        .stdout("2\n3\n");
}

#[test]
fn skip_and_take() {
    let f = fixture();
    f.query()
        .args(["--select", "Name", "--skip", "1", "--take", "1"])
        .assert()
        .success()
        .stdout("b\n");
}

#[test]
fn compile_error_points_at_offset() {
    let f = fixture();
    f.query()
        .args(["--where", "Age > 1 && Height > 2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "No property or field 'Height' exists in type 'Person' (at index 11)",
        ))
        .stderr(predicate::str::contains(format!("\n  {}^", " ".repeat(11))));
}

#[test]
fn compile_error_as_json() {
    let f = fixture();
    let out = f
        .query()
        .args(["--where", "Age > \"x\"", "--output", "json"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let body: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(body["expression"], "Age > \"x\"");
    assert_eq!(body["error"]["position"], 4);
}

#[test]
fn runtime_error_exits_1() {
    let f = fixture();
    f.query()
        .args(["--select", "Age / (Id - 2)"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("divide by zero"));
}

#[test]
fn bad_row_reports_its_path() {
    let f = fixture();
    fs::write(&f.data, r#"[{ "Id": "one" }]"#).unwrap();
    f.query()
        .assert()
        .failure()
        .stderr(predicate::str::contains("$[0].Id: expected Int32"));
}

#[test]
fn missing_schema_file() {
    dynq()
        .args(["query", "--schema", "/nonexistent/schema.toml", "--data", "rows.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error reading"));
}

// ──────────────────────────────────────────────
// check
// ──────────────────────────────────────────────

#[test]
fn check_reports_types() {
    let f = fixture();
    f.check("Age > 30").assert().success().stdout("Boolean\n");
    f.check("Bonus > 1.5").assert().success().stdout("Boolean\n");
    f.check("Bonus")
        .args(["--kind", "projection"])
        .assert()
        .success()
        .stdout("Decimal?\n");
    f.check("Age desc, Name")
        .args(["--kind", "ordering"])
        .assert()
        .success()
        .stdout("Int32 descending\nString ascending\n");
}

#[test]
fn check_json_output() {
    let f = fixture();
    let body = stdout_json(
        f.check("new (Name, Age * 2 as Double)")
            .args(["--kind", "projection", "--output", "json"]),
    );
    assert_eq!(body["element"], "Person");
    assert!(body["result"][0]["type"]
        .as_str()
        .unwrap()
        .starts_with("DynamicClass"));
}

#[test]
fn quiet_suppresses_errors() {
    let f = fixture();
    f.check("Age >")
        .arg("--quiet")
        .assert()
        .failure()
        .stderr("");
}
