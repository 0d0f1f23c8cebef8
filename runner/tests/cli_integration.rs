use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn device_tests_enabled() -> bool {
    env::var("LAUNCH_PROBE_DEVICE_TESTS").ok().as_deref() == Some("1")
}

fn probe_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_launch-probe"))
}

fn codec_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_symbol-codec"))
}

fn run_cmd(bin: &Path, state_dir: &Path, args: &[&str]) -> Output {
    Command::new(bin)
        .arg("--state-dir")
        .arg(state_dir)
        .args(args)
        .env_remove("LAUNCH_PROBE_LOG")
        .output()
        .unwrap_or_else(|err| panic!("failed to run {}: {err}", bin.display()))
}

fn run_probe(state_dir: &Path, args: &[&str]) -> Output {
    run_cmd(&probe_bin(), state_dir, args)
}

fn parse_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|err| panic!("failed to parse JSON output: {err}\nstdout:\n{stdout}"))
}

fn lookup_path<'a>(value: &'a serde_json::Value, path: &[&str]) -> Option<&'a serde_json::Value> {
    let mut cur = value;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

fn json_str<'a>(value: &'a serde_json::Value, path: &[&str]) -> Option<&'a str> {
    lookup_path(value, path).and_then(|v| v.as_str())
}

fn json_bool(value: &serde_json::Value, path: &[&str]) -> Option<bool> {
    lookup_path(value, path).and_then(|v| v.as_bool())
}

fn trace_lines(value: &serde_json::Value, path: &[&str]) -> Vec<String> {
    lookup_path(value, path)
        .and_then(|v| v.as_array())
        .unwrap_or_else(|| panic!("missing trace array at {path:?}"))
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn check_path_reports_directory_and_missing() {
    let state = tempfile::tempdir().unwrap();

    let root = run_probe(state.path(), &["check-path", "/"]);
    assert_eq!(root.status.code(), Some(0));
    let root_json = parse_json(&root);
    assert_eq!(json_str(&root_json, &["kind"]), Some("path_check_report"));
    assert_eq!(json_str(&root_json, &["data", "verdict"]), Some("directory"));
    assert_eq!(json_bool(&root_json, &["result", "ok"]), Some(true));
    assert!(
        trace_lines(&root_json, &["data", "trace"])
            .iter()
            .all(|line| line.starts_with("[*] "))
    );

    let missing = run_probe(
        state.path(),
        &["check-path", "/definitely/not/a/real/path/xyz123"],
    );
    assert_eq!(missing.status.code(), Some(3));
    let missing_json = parse_json(&missing);
    assert_eq!(json_str(&missing_json, &["data", "verdict"]), Some("not_found"));
    assert_eq!(
        json_str(&missing_json, &["result", "normalized_outcome"]),
        Some("not_found")
    );
}

#[test]
fn check_path_detects_regular_file() {
    let state = tempfile::tempdir().unwrap();
    let file = state.path().join("marker.txt");
    std::fs::write(&file, b"x").unwrap();

    let out = run_probe(state.path(), &["--no-history", "check-path", file.to_str().unwrap()]);
    assert!(out.status.success());
    let json = parse_json(&out);
    assert_eq!(json_str(&json, &["data", "verdict"]), Some("file"));
    assert!(!state.path().join("history.json").exists());
}

#[test]
fn missing_library_is_indeterminate() {
    let state = tempfile::tempdir().unwrap();
    let out = run_probe(
        state.path(),
        &[
            "check-bundle",
            "com.apple.tips",
            "--library",
            "/definitely/not/a/real/path/xyz123/Service",
        ],
    );
    assert_eq!(out.status.code(), Some(4));
    let json = parse_json(&out);
    assert_eq!(json_str(&json, &["kind"]), Some("bundle_check_report"));
    assert_eq!(json_str(&json, &["data", "verdict"]), Some("indeterminate"));
    assert_eq!(json_bool(&json, &["data", "installed"]), Some(false));
    assert_eq!(
        json_str(&json, &["result", "normalized_outcome"]),
        Some("load_error")
    );

    let trace = trace_lines(&json, &["data", "trace"]);
    assert_eq!(
        trace.first().map(String::as_str),
        Some("[*] Using API SBSLaunchApplicationWithIdentifierAndURLAndLaunchOptions")
    );
    assert!(trace.iter().any(|line| line.starts_with("[*] dlopen failed")));
    assert!(!trace.iter().any(|line| line.starts_with("[*] Released")));
    assert_eq!(trace.last().map(String::as_str), Some("[*] Verdict: indeterminate"));
}

#[test]
fn empty_bundle_id_is_a_usage_error() {
    let state = tempfile::tempdir().unwrap();
    let out = run_probe(state.path(), &["check-bundle", ""]);
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
}

#[test]
fn whitespace_bundle_id_is_probed() {
    let state = tempfile::tempdir().unwrap();
    let out = run_probe(
        state.path(),
        &["--no-history", "check-bundle", " ", "--library", "/nonexistent/lib"],
    );
    assert_eq!(out.status.code(), Some(4));
    assert_eq!(json_str(&parse_json(&out), &["data", "bundle_id"]), Some(" "));
}

#[test]
fn probes_run_without_a_state_directory() {
    let out = Command::new(probe_bin())
        .args(["check-path", "/"])
        .env_remove("HOME")
        .env_remove("LAUNCH_PROBE_HOME")
        .env_remove("LAUNCH_PROBE_LOG")
        .output()
        .expect("run launch-probe");
    assert_eq!(out.status.code(), Some(0));
    let json = parse_json(&out);
    assert_eq!(json_str(&json, &["data", "verdict"]), Some("directory"));
    assert_eq!(json_bool(&json, &["result", "ok"]), Some(true));
}

#[test]
fn decode_symbol_and_list_bindings() {
    let state = tempfile::tempdir().unwrap();

    let decoded = run_probe(state.path(), &["decode-symbol"]);
    assert!(decoded.status.success());
    let json = parse_json(&decoded);
    assert_eq!(
        json_str(&json, &["data", "symbol"]),
        Some("SBSLaunchApplicationWithIdentifierAndURLAndLaunchOptions")
    );

    let unknown = run_probe(state.path(), &["decode-symbol", "--binding", "nope"]);
    assert_eq!(unknown.status.code(), Some(2));

    let listed = run_probe(state.path(), &["list-bindings"]);
    assert!(listed.status.success());
    let json = parse_json(&listed);
    assert_eq!(json_str(&json, &["data", "default_binding"]), Some("sbs-launch"));
    let bindings = lookup_path(&json, &["data", "bindings"])
        .and_then(|v| v.as_array())
        .expect("bindings array");
    assert_eq!(bindings.len(), 1);
    assert_eq!(
        bindings[0].get("library_path").and_then(|v| v.as_str()),
        Some("/System/Library/PrivateFrameworks/SpringBoardServices.framework/SpringBoardServices")
    );
    assert!(bindings[0].get("obfuscated_symbol").is_none());
}

#[test]
fn history_records_and_clears() {
    let state = tempfile::tempdir().unwrap();

    run_probe(state.path(), &["check-path", "/"]);
    run_probe(
        state.path(),
        &["check-bundle", "com.apple.tips", "--library", "/nonexistent/lib"],
    );
    run_probe(
        state.path(),
        &["check-bundle", "com.example.game", "--library", "/nonexistent/lib"],
    );

    let listed = run_probe(state.path(), &["--compact", "history"]);
    assert!(listed.status.success());
    assert_eq!(String::from_utf8_lossy(&listed.stdout).trim().lines().count(), 1);
    let json = parse_json(&listed);
    let apple = lookup_path(&json, &["data", "apple_bundle_ids"])
        .and_then(|v| v.as_array())
        .expect("apple ids");
    assert_eq!(apple.len(), 1);
    assert_eq!(apple[0].get("id").and_then(|v| v.as_str()), Some("com.apple.tips"));
    assert_eq!(apple[0].get("success").and_then(|v| v.as_bool()), Some(false));
    let paths = lookup_path(&json, &["data", "paths"])
        .and_then(|v| v.as_array())
        .expect("paths");
    assert_eq!(paths.len(), 1);

    let removed = run_probe(state.path(), &["history", "remove-bundle", "1"]);
    assert!(removed.status.success());
    let json = parse_json(&removed);
    assert_eq!(json_str(&json, &["data", "removed", "id"]), Some("com.example.game"));

    let out_of_range = run_probe(state.path(), &["history", "remove-path", "9"]);
    assert_eq!(out_of_range.status.code(), Some(2));

    let cleared = run_probe(state.path(), &["history", "clear"]);
    assert!(cleared.status.success());
    assert_eq!(json_bool(&parse_json(&cleared), &["data", "empty"]), Some(true));
}

#[test]
fn startup_runs_enabled_checks() {
    let state = tempfile::tempdir().unwrap();

    let idle = run_probe(state.path(), &["startup"]);
    assert!(idle.status.success());
    let json = parse_json(&idle);
    let skipped = lookup_path(&json, &["data", "skipped"])
        .and_then(|v| v.as_array())
        .expect("skipped");
    assert_eq!(skipped.len(), 2);
    assert!(trace_lines(&json, &["data", "trace"]).is_empty());

    let set = run_probe(state.path(), &["settings", "set", "--path-check", "/"]);
    assert!(set.status.success());
    let json = parse_json(&set);
    assert_eq!(
        json_bool(&json, &["data", "settings", "launch_check_file_enabled"]),
        Some(true)
    );

    let run = run_probe(state.path(), &["startup"]);
    assert!(run.status.success());
    let json = parse_json(&run);
    assert_eq!(
        json_str(&json, &["data", "path_check", "verdict"]),
        Some("directory")
    );
    assert!(lookup_path(&json, &["data", "bundle_check"]).is_some_and(|v| v.is_null()));
    assert_eq!(
        trace_lines(&json, &["data", "trace"]),
        vec!["[*] Launch File Check: /: Exists".to_string()]
    );
}

#[test]
fn symbol_codec_round_trips_launch_symbol() {
    let state = tempfile::tempdir().unwrap();
    let encoded = Command::new(codec_bin())
        .args(["encode", "SBSLaunchApplicationWithIdentifierAndURLAndLaunchOptions"])
        .output()
        .expect("run symbol-codec");
    assert!(encoded.status.success());
    let json = parse_json(&encoded);
    let hex = json_str(&json, &["data", "hex"]).expect("hex").to_string();
    assert_eq!(hex.len(), 56 * 2);

    let decoded = Command::new(codec_bin())
        .args(["decode", hex.as_str()])
        .current_dir(state.path())
        .output()
        .expect("run symbol-codec");
    assert!(decoded.status.success());
    assert_eq!(
        json_str(&parse_json(&decoded), &["data", "text"]),
        Some("SBSLaunchApplicationWithIdentifierAndURLAndLaunchOptions")
    );
}

#[test]
fn device_launch_service_answers() {
    if !device_tests_enabled() {
        return;
    }
    let state = tempfile::tempdir().unwrap();
    let out = run_probe(state.path(), &["--no-history", "check-bundle", "com.apple.mobilesafari"]);
    let json = parse_json(&out);
    assert_eq!(json_str(&json, &["data", "verdict"]), Some("present"));
    assert_eq!(out.status.code(), Some(0));
}
