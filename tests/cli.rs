//! Integration tests: run the hookprof binary on traces written to a temp dir.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const TRACE: &str = r#"{"t":0.000,"heap_kb":1000,"event":"call","id":1,"unit":"game.lua","line":10,"name":"update"}
{"t":0.001,"event":"call","id":2,"unit":"game.lua","line":40,"name":"draw"}
{"t":0.011,"heap_kb":1012,"event":"return","id":2,"unit":"game.lua","line":40}
{"t":0.012,"event":"call","id":3,"unit":"game.lua","line":40,"name":"draw"}
{"t":0.032,"heap_kb":1020,"event":"return","id":3,"unit":"game.lua","line":40}

{"t":0.040,"event":"call","id":9,"name":"print"}
{"t":0.041,"event":"return","id":9,"name":"print"}
{"t":0.050,"heap_kb":1030,"event":"return","id":1,"unit":"game.lua","line":10}
{"t":0.100,"event":"gc"}
{"t":0.200,"event":"gc"}
"#;

fn write_trace(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("trace.ndjson");
    fs::write(&path, contents).unwrap();
    path
}

fn hookprof(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hookprof"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("HOOKPROF_LIMIT")
        .env_remove("HOOKPROF_PRECISION")
        .output()
        .expect("failed to run hookprof")
}

#[test]
fn report_prints_fixed_width_table() {
    let tmp = tempfile::tempdir().unwrap();
    let trace = write_trace(tmp.path(), TRACE);

    let out = hookprof(&["report", trace.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let lines: Vec<&str> = stdout.lines().collect();
    let width = lines[0].chars().count();
    for line in &lines[..lines.len() - 1] {
        assert_eq!(line.chars().count(), width, "ragged line {line:?} in\n{stdout}");
    }

    // draw: two closures merged, 2 calls; update: 1 call. print is native.
    assert!(lines[3].contains("| draw "), "{stdout}");
    assert!(lines[3].contains("game.lua:40"), "{stdout}");
    assert!(lines[4].contains("| update "), "{stdout}");
    assert!(!stdout.contains("print"), "{stdout}");
    assert!(stdout.contains("0.030000"), "{stdout}");
    assert!(stdout.ends_with("GC cycles: 2, avg interval: 0.100000\n"), "{stdout}");
}

#[test]
fn rows_prints_json() {
    let tmp = tempfile::tempdir().unwrap();
    let trace = write_trace(tmp.path(), TRACE);

    let out = hookprof(&["rows", trace.to_str().unwrap(), "--sort", "mem", "--limit", "1"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let rows: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["function"], "update");
    assert_eq!(rows[0]["rank"], 1);
    assert_eq!(rows[0]["calls"], 1);
    assert_eq!(rows[0]["memory_kb"], 30.0);
    assert_eq!(rows[0]["line"], 10);
}

#[test]
fn precision_flag_controls_decimals() {
    let tmp = tempfile::tempdir().unwrap();
    let trace = write_trace(tmp.path(), TRACE);

    let out = hookprof(&["report", trace.to_str().unwrap(), "--precision", "0.001"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success());
    assert!(stdout.contains("| 0.030 "), "{stdout}");
    assert!(!stdout.contains("0.030000"), "{stdout}");

    // A quarter-second step needs two decimals.
    let out = hookprof(&["report", trace.to_str().unwrap(), "--precision", "0.25"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success());
    assert!(stdout.contains("| 0.00 "), "{stdout}");
}

#[test]
fn unknown_sort_key_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let trace = write_trace(tmp.path(), TRACE);

    let out = hookprof(&["report", trace.to_str().unwrap(), "--sort", "speed"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.starts_with("error: unknown sort key 'speed'"), "{stderr}");
}

#[test]
fn malformed_trace_reports_line_number() {
    let tmp = tempfile::tempdir().unwrap();
    let trace = write_trace(
        tmp.path(),
        "{\"t\":0,\"event\":\"gc\"}\n\n{\"t\":1,\"event\":\"call\"}\n",
    );

    let out = hookprof(&["report", trace.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("trace.ndjson:3"), "{stderr}");
    assert!(stderr.contains("id"), "{stderr}");
}

#[test]
fn missing_trace_fails_with_path() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope.ndjson");

    let out = hookprof(&["rows", missing.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("failed to read trace"), "{stderr}");
    assert!(stderr.contains("nope.ndjson"), "{stderr}");
}
