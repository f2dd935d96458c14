//! Integration tests for the drawscan CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to get a drawscan command isolated from the caller's environment
fn drawscan(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("drawscan").unwrap();
    cmd.current_dir(dir)
        .env_remove("DRAWSCAN_SHOP_LINEAR")
        .env_remove("DRAWSCAN_SHOP_GEOMETRIC")
        .env_remove("DRAWSCAN_FORMAT")
        .env_remove("RUST_LOG");
    cmd
}

/// A small package: a two-sheet bracket, a plate and a sheet with no title block
fn setup_package() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let drawings = tmp.path().join("drawings");
    fs::create_dir(&drawings).unwrap();
    fs::write(
        drawings.join("12345-01.txt"),
        "PART NO: 12345-01\nDESCRIPTION: MOUNTING BRACKET\nMATERIAL: 304 STAINLESS STEEL\nREV: B\n\
         NOTES:\n1. DEBURR ALL EDGES\n2. BREAK ALL SHARP EDGES .015 MAX\n\
         \u{000C}PART NO: 12345-01\nSHEET 2 OF 2\n1. DEBURR ALL EDGES\n",
    )
    .unwrap();
    fs::write(
        drawings.join("67890.txt"),
        "PART NO: 67890\nDESCRIPTION: COVER PLATE\nREV: A\n",
    )
    .unwrap();
    fs::write(drawings.join("loose.txt"), "NOTES:\n1. PAINT RED\n").unwrap();
    tmp
}

// ============================================================================
// Scan
// ============================================================================

#[test]
fn test_scan_lists_part_numbers() {
    let tmp = setup_package();
    drawscan(tmp.path())
        .args(["scan", "drawings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("12345-01"))
        .stdout(predicate::str::contains("67890"))
        .stdout(predicate::str::contains("2 part(s)"))
        .stderr(predicate::str::contains("1 page(s) had no readable part number"));
}

#[test]
fn test_scan_json_output() {
    let tmp = setup_package();
    let output = drawscan(tmp.path())
        .args(["scan", "drawings", "-f", "json", "-q"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let index: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(index["total_pages"], 4);
    assert_eq!(index["pages_by_part_number"]["12345-01"].as_array().unwrap().len(), 2);
    assert_eq!(index["unmatched_pages"].as_array().unwrap().len(), 1);
}

#[test]
fn test_scan_parallel_matches_serial() {
    let tmp = setup_package();
    let serial = drawscan(tmp.path())
        .args(["scan", "drawings", "-f", "md", "-q"])
        .output()
        .unwrap();
    let parallel = drawscan(tmp.path())
        .args(["scan", "drawings", "-f", "md", "-q", "-j", "3"])
        .output()
        .unwrap();
    assert!(parallel.status.success());
    assert_eq!(serial.stdout, parallel.stdout);
}

#[test]
fn test_scan_writes_output_file() {
    let tmp = setup_package();
    drawscan(tmp.path())
        .args(["scan", "drawings", "-f", "yaml", "-o", "index.yaml"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Output written to:"));

    let content = fs::read_to_string(tmp.path().join("index.yaml")).unwrap();
    assert!(content.contains("12345-01"));
}

#[test]
fn test_scan_rejects_file_argument() {
    let tmp = setup_package();
    drawscan(tmp.path())
        .args(["scan", "drawings/67890.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a directory"));
}

#[test]
fn test_config_default_format() {
    let tmp = setup_package();
    fs::write(tmp.path().join(".drawscan.yaml"), "default_format: json\n").unwrap();
    drawscan(tmp.path())
        .args(["scan", "drawings", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"));
}

// ============================================================================
// Analyze / Drawing
// ============================================================================

#[test]
fn test_analyze_reports_each_page() {
    let tmp = setup_package();
    drawscan(tmp.path())
        .args(["analyze", "drawings/12345-01.txt", "-f", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PAGE"))
        .stdout(predicate::str::contains("2 page(s)"));
}

#[test]
fn test_analyze_missing_pdf_text() {
    let tmp = setup_package();
    fs::write(tmp.path().join("drawings/scan-only.pdf"), b"%PDF-1.4").unwrap();
    drawscan(tmp.path())
        .args(["analyze", "drawings/scan-only.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No page text"));
}

#[test]
fn test_drawing_merges_sheets() {
    let tmp = setup_package();
    let output = drawscan(tmp.path())
        .args(["drawing", "drawings", "12345-01", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let data: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(data["page_count"], 2);
    assert_eq!(data["description"], "MOUNTING BRACKET");
    assert_eq!(data["revision"], "B");
}

#[test]
fn test_drawing_not_found() {
    let tmp = setup_package();
    drawscan(tmp.path())
        .args(["drawing", "drawings", "NOPE-999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No drawing found"));
}

// ============================================================================
// Match / Reconcile
// ============================================================================

#[test]
fn test_match_components_csv() {
    let tmp = setup_package();
    fs::write(
        tmp.path().join("components.csv"),
        "part_number,file_path\n12345-01,\n,models/67890.sldprt\nX-999,\n",
    )
    .unwrap();

    drawscan(tmp.path())
        .args(["match", "drawings", "--components", "components.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exact_part_number"))
        .stdout(predicate::str::contains("file_name"))
        .stdout(predicate::str::contains("unmatched"))
        .stdout(predicate::str::contains("3 component(s)"));
}

#[test]
fn test_match_json_lists_unmatched() {
    let tmp = setup_package();
    fs::write(tmp.path().join("components.csv"), "part_number\n12345-01\n").unwrap();

    let output = drawscan(tmp.path())
        .args(["match", "drawings", "-c", "components.csv", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["matched"].as_array().unwrap().len(), 1);
    // 67890 is unclaimed and the loose sheet has no part number
    assert_eq!(result["unmatched_drawings"].as_array().unwrap().len(), 2);
}

#[test]
fn test_reconcile_reports_conflicts_and_gaps() {
    let tmp = setup_package();
    fs::write(
        tmp.path().join("parts.yaml"),
        "- file_path: models/bracket.sldprt\n  part_number: 12345-01\n  material: 316 SS\n\
       - part_number: \"67890\"\n  description: COVER PLATE\n",
    )
    .unwrap();

    let output = drawscan(tmp.path())
        .args(["reconcile", "drawings", "--parts", "parts.yaml", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let bracket = &reports[0]["result"];
    assert_eq!(bracket["conflicts"][0]["field"], "material");
    assert_eq!(bracket["rename_suggestion"]["part_number"], "12345-01");
    let fills = bracket["gap_fills"].as_array().unwrap();
    assert!(fills.iter().any(|f| f["field"] == "description"));

    assert!(reports[1]["result"]["conflicts"].is_null());
}

// ============================================================================
// Misc
// ============================================================================

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();
    drawscan(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("drawscan"));
}

#[test]
fn test_help_lists_commands() {
    let tmp = TempDir::new().unwrap();
    drawscan(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("reconcile"));
}
