//! CLI integration tests

use std::path::PathBuf;
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fleetctl(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "fleet-cli", "--"])
        .args(args)
        .env_remove("FLEET_CATALOG_URL")
        .env_remove("FLEET_CONFIG")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = fleetctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("NodePools"), "Should describe the tool");
    assert!(stdout.contains("recommend"), "Should show recommend command");
    assert!(stdout.contains("costs"), "Should show costs command");
    assert!(stdout.contains("price"), "Should show price command");
    assert!(stdout.contains("candidates"), "Should show candidates command");
    assert!(stdout.contains("--catalog-url"), "Should show catalog-url option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = fleetctl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("fleetctl"), "Should show binary name");
}

/// Test recommend subcommand help
#[test]
fn test_recommend_help() {
    let output = fleetctl(&["recommend", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Recommend help should succeed");
    assert!(stdout.contains("--snapshot"), "Should show snapshot option");
    assert!(stdout.contains("--nodepool"), "Should show nodepool option");
}

/// Test recommendations for a snapshot in JSON
#[test]
fn test_recommend_json() {
    let snapshot = fixture("snapshot.json");
    let output = fleetctl(&[
        "--format",
        "json",
        "recommend",
        "--snapshot",
        snapshot.to_str().unwrap(),
    ]);

    assert!(
        output.status.success(),
        "Recommend should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let recs: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let recs = recs.as_array().expect("array of recommendations");
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0]["nodepool"], "default");
    assert_eq!(recs[0]["has_recommendation"], true);
    assert_eq!(recs[2]["nodepool"], "spare");
    assert_eq!(recs[2]["has_recommendation"], false);
}

/// Test filtering to one NodePool, and an unknown one
#[test]
fn test_recommend_single_nodepool() {
    let snapshot = fixture("snapshot.json");
    let output = fleetctl(&[
        "--format",
        "json",
        "recommend",
        "--snapshot",
        snapshot.to_str().unwrap(),
        "--nodepool",
        "arm-cache",
    ]);
    assert!(output.status.success());
    let recs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(recs.as_array().unwrap().len(), 1);
    assert_eq!(recs[0]["current"]["architecture"], "arm64");

    let missing = fleetctl(&[
        "recommend",
        "--snapshot",
        snapshot.to_str().unwrap(),
        "--nodepool",
        "nope",
    ]);
    assert!(!missing.status.success(), "Unknown NodePool should fail");
}

/// Test cost summary
#[test]
fn test_costs_json() {
    let snapshot = fixture("snapshot.json");
    let output = fleetctl(&["--format", "json", "costs", "--snapshot", snapshot.to_str().unwrap()]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["pools_analyzed"], 3);
    assert!(report["current_hourly_cost"].as_f64().unwrap() > 0.0);
    assert!(report["monthly_savings"].as_f64().unwrap() >= 0.0);
}

/// Test spot price lookup from the static table
#[test]
fn test_price_lookup() {
    let output = fleetctl(&["--format", "json", "price", "t3.small", "--class", "spot"]);

    assert!(output.status.success());
    let quote: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(quote["source"], "static-table");
    assert!((quote["hourly_price"].as_f64().unwrap() - 0.0052).abs() < 1e-9);
}

/// Test candidates for a memory-heavy ARM requirement
#[test]
fn test_candidates_lookup() {
    let output = fleetctl(&[
        "--format", "json", "candidates", "--cpu", "4", "--memory", "40", "--arch", "arm64",
    ]);

    assert!(output.status.success());
    let list: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(list["ratio_class"], "memory");
    assert_eq!(list["source"], "static-table");
    for spec in list["types"].as_array().unwrap() {
        assert_eq!(spec["architecture"], "arm64");
    }
}

/// Test metrics emission after a command
#[test]
fn test_emit_metrics() {
    let output = fleetctl(&["--emit-metrics", "price", "m6i.xlarge"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("fleet_advisor_price_lookups_total"));
}
