//! Binary-level tests for the `plan` and `download` subcommands

use super::support::{api_url, envelope, mount_json, request_count, rows};
use assert_cmd::Command;
use tempfile::TempDir;
use wiremock::MockServer;

fn bin() -> Command {
    Command::cargo_bin("comtrade-downloader").unwrap()
}

#[test]
fn test_plan_human_output() {
    let output = bin()
        .args(["plan", "--reporter", "1,2,3,4,5,6,7", "--partner", "0", "--period", "2017"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 API call(s): 2 reporter x 1 partner x 1 period x 1 product chunk(s)"));
    assert!(stdout.contains("slice 0 (r=1,2,3,4,5 p=0 ps=2017 cc=TOTAL)"));
    assert!(stdout.contains("slice 1 (r=6,7 p=0 ps=2017 cc=TOTAL)"));
}

#[test]
fn test_plan_json_output() {
    let output = bin()
        .args([
            "plan",
            "--output-format",
            "json",
            "--reporter",
            "842",
            "--period",
            "2010-2016",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["calls"], 2);
    assert_eq!(json["slices"][0]["period"]["Codes"][0], "2010");
    assert_eq!(json["slices"][1]["period"]["Codes"][0], "2015");
}

#[test]
fn test_plan_rejects_multiple_wildcards() {
    let output = bin()
        .args(["plan", "--reporter", "all", "--partner", "all"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("only one of reporter, partner and period"));
}

#[test]
fn test_plan_rejects_bad_tradeflow() {
    let output = bin()
        .args(["plan", "--reporter", "842", "--tradeflow", "sideways"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid tradeflow"));
}

#[test]
fn test_reporter_is_required() {
    bin().args(["download"]).assert().failure();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_download_against_mock_endpoint() {
    let server = MockServer::start().await;
    mount_json(&server, envelope(rows(842, 3))).await;
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("usa");
    let base_url = api_url(&server);

    let run = {
        let target = target.clone();
        move || {
            bin()
                .args(["download", "--reporter", "842", "--partner", "0", "--period", "2017"])
                .args(["--pacing-ms", "1", "--quiet", "--base-url", &base_url])
                .arg("--output")
                .arg(&target)
                .output()
                .unwrap()
        }
    };

    let output = tokio::task::spawn_blocking(run.clone()).await.unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Download completed!"));
    assert!(stdout.contains("Rows written: 3"));
    assert!(dir.path().join("usa.csv").exists());

    // Second run finds the artifact
    let output = tokio::task::spawn_blocking(run).await.unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Output already exists"));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_download_json_report() {
    let server = MockServer::start().await;
    mount_json(&server, envelope(rows(124, 2))).await;
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("canada.csv");
    let base_url = api_url(&server);

    let output = tokio::task::spawn_blocking(move || {
        bin()
            .args(["--output-format", "json", "download", "--reporter", "124"])
            .args(["--partner", "0", "--period", "2017", "--pacing-ms", "1", "-q"])
            .args(["--base-url", &base_url])
            .arg("-o")
            .arg(&target)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "completed");
    assert_eq!(json["report"]["calls"], 1);
    assert_eq!(json["report"]["rows_written"], 2);
}
