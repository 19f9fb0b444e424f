#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Command line integration tests.

use std::fs;
use std::path::Path;

use anyhow::Result;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{Value as JsonValue, json};
use tempfile::TempDir;

/// `ccview` isolated from any config file or CCVIEW_* setting on the host.
fn ccview_command(cwd: &Path) -> Result<assert_cmd::Command> {
    let mut cmd = assert_cmd::Command::cargo_bin("ccview")?;
    cmd.current_dir(cwd);
    cmd.env("XDG_CONFIG_HOME", cwd.join("xdg"));
    cmd.env("RUST_LOG", "error");
    for (key, _) in std::env::vars() {
        if key.starts_with("CCVIEW_") {
            cmd.env_remove(key);
        }
    }
    Ok(cmd)
}

fn write_json(dir: &Path, name: &str, value: &JsonValue) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn stdout_json(output: &std::process::Output) -> JsonValue {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn mcp_records() -> JsonValue {
    json!([
        {
            "name": "github",
            "status": "active",
            "sourcePath": "/home/dev/.claude.json",
            "server": {"type": "stdio", "command": "npx", "config": {"command": "npx"}}
        },
        {
            "name": "Sqlite",
            "status": "inactive",
            "sourcePath": "./.mcp.json",
            "server": {"type": "stdio", "command": "uvx", "config": {}}
        },
        {
            "name": "browser",
            "status": "active",
            "sourcePath": "/opt/tools/browser.json",
            "server": {"type": "http", "url": "http://localhost:9000", "config": {}}
        }
    ])
}

fn agent_records() -> JsonValue {
    json!([
        {
            "name": "planner",
            "status": "active",
            "sourcePath": "./.claude/agents/planner.md",
            "agent": {"model": "sonnet", "permissions": {"type": "read", "scopes": ["repo"]}}
        }
    ])
}

#[test]
fn classify_reports_scope_per_path() -> Result<()> {
    let tmp = TempDir::new()?;
    let output = ccview_command(tmp.path())?
        .args([
            "classify",
            "/home/u/.claude.json",
            "./.mcp.json",
            "/opt/other.json",
            "--json",
        ])
        .output()?;
    assert!(output.status.success());

    let rows = stdout_json(&output);
    let scopes: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["scope"].as_str().unwrap())
        .collect();
    assert_eq!(scopes, vec!["user", "project", "local"]);
    assert_eq!(rows[0]["invalidates"], json!({"user": true, "project": false}));
    assert_eq!(rows[2]["tracked"], json!(false));
    Ok(())
}

#[test]
fn classify_agents_with_kind_flag() -> Result<()> {
    let tmp = TempDir::new()?;
    ccview_command(tmp.path())?
        .args(["classify", "--kind", "agent", "/home/u/.claude/agents/a.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user"));
    Ok(())
}

#[test]
fn unify_filters_and_sorts() -> Result<()> {
    let tmp = TempDir::new()?;
    let mcp = write_json(tmp.path(), "mcp.json", &mcp_records());
    let agents = write_json(tmp.path(), "agents.json", &agent_records());

    let output = ccview_command(tmp.path())?
        .arg("unify")
        .arg("--mcp")
        .arg(&mcp)
        .arg("--agents")
        .arg(&agents)
        .args(["--status", "active", "--sort", "name", "--desc", "--json"])
        .output()?;
    assert!(output.status.success());

    let report = stdout_json(&output);
    let names: Vec<&str> = report["capabilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["planner", "github", "browser"]);
    assert_eq!(report["totalCount"], json!(4));
    assert_eq!(report["mcpCount"], json!(3));
    assert_eq!(report["agentCount"], json!(1));
    assert_eq!(report["shown"], json!(3));
    Ok(())
}

#[test]
fn unify_rejects_unknown_status() -> Result<()> {
    let tmp = TempDir::new()?;
    ccview_command(tmp.path())?
        .args(["unify", "--status", "paused"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognised value `paused`"));
    Ok(())
}

#[test]
fn resolve_marks_winners_and_overrides() -> Result<()> {
    let tmp = TempDir::new()?;
    let entries = write_json(
        tmp.path(),
        "entries.json",
        &json!([
            {
                "key": "model",
                "value": "sonnet",
                "source": {"kind": "user", "path": "/home/dev/.claude.json", "priority": 10}
            },
            {
                "key": "model",
                "value": "opus",
                "source": {"kind": "project", "path": "./.mcp.json", "priority": 1}
            },
            {
                "key": "theme",
                "value": "dark",
                "source": {"kind": "user", "path": "/home/dev/.claude.json", "priority": 10}
            }
        ]),
    );

    let output = ccview_command(tmp.path())?
        .arg("resolve")
        .arg(&entries)
        .arg("--json")
        .output()?;
    assert!(output.status.success());

    let chain = stdout_json(&output);
    assert_eq!(chain["resolved"], json!({"model": "opus", "theme": "dark"}));
    let flags: Vec<(bool, bool)> = chain["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["inherited"].as_bool().unwrap(),
                e["overridden"].as_bool().unwrap(),
            )
        })
        .collect();
    assert_eq!(flags, vec![(true, false), (false, true), (true, false)]);
    Ok(())
}

#[test]
fn summarize_prints_highlight_counts() -> Result<()> {
    let tmp = TempDir::new()?;
    let records = write_json(
        tmp.path(),
        "diff.json",
        &json!([
            {"capabilityId": "mcp:a", "status": "match", "severity": "low"},
            {"capabilityId": "mcp:b", "status": "different", "severity": "medium"},
            {"capabilityId": "mcp:c", "status": "only-left", "severity": "high"},
            {"capabilityId": "agent:d", "status": "only-right", "severity": "low"}
        ]),
    );

    ccview_command(tmp.path())?
        .arg("summarize")
        .arg(&records)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "3 differences: 1 only in A, 1 only in B, 1 different",
        ))
        .stdout(predicate::str::contains("mcp:a"));

    let output = ccview_command(tmp.path())?
        .arg("summarize")
        .arg(&records)
        .args(["--only-differences", "--hide-b", "--json"])
        .output()?;
    assert!(output.status.success());
    let report = stdout_json(&output);
    let ids: Vec<&str> = report["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["capabilityId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["mcp:b", "mcp:c"]);
    assert_eq!(report["summary"]["totalDifferences"], json!(3));
    Ok(())
}

#[test]
fn summarize_exports_csv_into_out_dir() -> Result<()> {
    let tmp = TempDir::new()?;
    let records = write_json(
        tmp.path(),
        "diff.json",
        &json!([
            {"capabilityId": "mcp:a", "status": "match", "severity": "low"},
            {"capabilityId": "mcp:b", "status": "different", "severity": "medium"}
        ]),
    );
    let out = tmp.path().join("exports");

    let output = ccview_command(tmp.path())?
        .arg("summarize")
        .arg(&records)
        .args(["--only-differences", "--export", "csv", "--json"])
        .args(["--left", "/work/app-a", "--right", "/work/App B"])
        .arg("--out")
        .arg(&out)
        .output()?;
    assert!(output.status.success());

    let result = stdout_json(&output);
    assert_eq!(result["format"], json!("csv"));
    assert_eq!(result["recordCount"], json!(2));
    let path = std::path::PathBuf::from(result["filePath"].as_str().unwrap());
    assert_eq!(path.parent(), Some(out.as_path()));
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("app-a-vs-app-b-comparison-"), "{name}");
    assert!(name.ends_with(".csv"));

    let written = fs::read_to_string(&path)?;
    assert_eq!(written.lines().count(), 3);
    assert!(written.contains("mcp:a,match,low,,"));
    Ok(())
}

#[test]
fn summarize_rejects_unknown_export_format() -> Result<()> {
    let tmp = TempDir::new()?;
    let records = write_json(tmp.path(), "diff.json", &json!([]));
    ccview_command(tmp.path())?
        .arg("summarize")
        .arg(&records)
        .args(["--export", "xlsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognised value `xlsx`"));
    Ok(())
}

#[test]
fn desc_without_sort_field_is_stable_by_name() -> Result<()> {
    let tmp = TempDir::new()?;
    let mcp = write_json(
        tmp.path(),
        "mcp.json",
        &json!([
            {
                "name": "github",
                "status": "active",
                "sourcePath": "/home/dev/.claude.json",
                "server": {"type": "stdio", "command": "npx", "config": {}}
            },
            {
                "name": "github",
                "status": "active",
                "sourcePath": "./.mcp.json",
                "server": {"type": "stdio", "command": "uvx", "config": {}}
            },
            {
                "name": "sqlite",
                "status": "active",
                "sourcePath": "./.mcp.json",
                "server": {"type": "stdio", "command": "uvx", "config": {}}
            }
        ]),
    );

    let asc = ccview_command(tmp.path())?
        .arg("unify")
        .arg("--mcp")
        .arg(&mcp)
        .arg("--json")
        .output()?;
    let desc = ccview_command(tmp.path())?
        .arg("unify")
        .arg("--mcp")
        .arg(&mcp)
        .args(["--desc", "--json"])
        .output()?;
    assert!(asc.status.success() && desc.status.success());

    let ids = |output: &std::process::Output| -> Vec<String> {
        stdout_json(output)["capabilities"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap().to_string())
            .collect()
    };
    let asc_ids = ids(&asc);
    let desc_ids = ids(&desc);
    assert_eq!(desc_ids[0], "mcp:sqlite@./.mcp.json");
    // equal names keep the order unify produced
    assert_eq!(&desc_ids[1..], &asc_ids[..2]);
    Ok(())
}

#[test]
fn config_file_markers_change_classification() -> Result<()> {
    let tmp = TempDir::new()?;
    let config = tmp.path().join("ccview.toml");
    fs::write(&config, "[markers]\nuser_mcp = \"registry.json\"\n")?;

    let output = ccview_command(tmp.path())?
        .args(["classify", "/srv/registry.json", "/home/u/.claude.json", "--json"])
        .output()?;
    assert!(output.status.success());
    let rows = stdout_json(&output);
    assert_eq!(rows[0]["scope"], json!("user"));
    assert_eq!(rows[1]["scope"], json!("local"));
    Ok(())
}

#[test]
fn missing_config_file_fails() -> Result<()> {
    let tmp = TempDir::new()?;
    ccview_command(tmp.path())?
        .args(["--config", "nowhere.toml", "classify", "./.mcp.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load engine configuration"));
    Ok(())
}

#[test]
fn invalid_config_value_fails() -> Result<()> {
    let tmp = TempDir::new()?;
    ccview_command(tmp.path())?
        .env("CCVIEW_CACHE__CAPACITY", "0")
        .args(["classify", "./.mcp.json"])
        .assert()
        .failure();
    Ok(())
}
