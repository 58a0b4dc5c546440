//! Integration tests for the tallyline binary

use std::io::Write;
use std::process::Command;

const SALES: &str = "\
#+NAME: sales
| Day     | Level | Quantity |
|---------+-------+----------|
| Monday  |    30 |       11 |
| Monday  |    25 |        3 |
| Tuesday |    51 |       12 |
";

fn write_input(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn run(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_tallyline"))
        .args(args)
        // Tests must not depend on a user's config.toml.
        .env("XDG_CONFIG_HOME", std::env::temp_dir().join("tallyline-cli-tests"))
        .output()
        .expect("Failed to execute tallyline");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code().unwrap_or(-1))
}

#[test]
fn test_aggregate_pipe_table() {
    let input = write_input(".org", SALES);
    let path = input.path().to_str().unwrap();
    let (stdout, _, code) = run(&[
        "aggregate",
        path,
        "--table",
        "sales",
        "--cols",
        "Day mean(Level) sum(Quantity)",
    ]);
    assert_eq!(code, 0);
    assert_eq!(
        stdout,
        "\
| Day     | mean(Level) | sum(Quantity) |
|---------+-------------+---------------|
| Monday  |        27.5 |            14 |
| Tuesday |          51 |            12 |
"
    );
}

#[test]
fn test_aggregate_with_condition() {
    let input = write_input(".org", SALES);
    let path = input.path().to_str().unwrap();
    let (stdout, _, code) = run(&["aggregate", path, "-c", "Day count()", "--cond", "Level > 30"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("| Tuesday |       1 |"), "{}", stdout);
    assert!(!stdout.contains("Monday"));
}

#[test]
fn test_aggregate_csv() {
    let input = write_input(".csv", "Day,Level\nMonday,30\nMonday,25\nTuesday,51\n");
    let path = input.path().to_str().unwrap();
    let (stdout, _, code) = run(&["aggregate", path, "--cols", "Day;^A max(Level);'top'"]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "Day,top\nTuesday,51\nMonday,30\n");
}

#[test]
fn test_transpose() {
    let input = write_input(".csv", "a,b\n1,2\n3,4\n");
    let path = input.path().to_str().unwrap();
    let (stdout, _, code) = run(&["transpose", path, "--no-header"]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "a,1,3\nb,2,4\n");
}

#[test]
fn test_unknown_column_fails() {
    let input = write_input(".org", SALES);
    let path = input.path().to_str().unwrap();
    let (stdout, stderr, code) = run(&["aggregate", path, "--cols", "Day sum(Nope)"]);
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("sum(Nope)"), "{}", stderr);
}

#[test]
fn test_missing_table_fails() {
    let input = write_input(".org", SALES);
    let path = input.path().to_str().unwrap();
    let (_, stderr, code) = run(&["aggregate", path, "--table", "other", "--cols", "Day"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("other"));
}

#[test]
fn test_functions_listing() {
    let (stdout, _, code) = run(&["functions"]);
    assert_eq!(code, 0);
    assert!(stdout.lines().any(|l| l.starts_with("meane")));
    assert!(stdout.lines().any(|l| l.starts_with("sqrt") && l.contains("math")));
}

#[test]
fn test_missing_input_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.org");
    let (stdout, stderr, code) = run(&["aggregate", path.to_str().unwrap(), "--cols", "Day"]);
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Failed to read"), "{}", stderr);
}
