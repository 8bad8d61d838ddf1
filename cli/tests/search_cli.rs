use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use pretty_assertions::assert_eq;
use serde_json::Value as JsonValue;
use serde_json::json;
use tempfile::TempDir;

fn coderag_command() -> Result<assert_cmd::Command> {
    let mut cmd = assert_cmd::Command::cargo_bin("coderag")?;
    cmd.env("RUST_LOG", "off");
    Ok(cmd)
}

fn write_corpus(dir: &Path) -> Result<PathBuf> {
    let corpus = json!([
        {
            "id": "auth",
            "content": "fn authenticate_user(token: &str) -> bool { verify(token) }",
            "repo": "alpha",
            "path": "src/auth.rs",
            "language": "rust",
            "start_line": 10,
            "end_line": 12
        },
        {
            "id": "pool",
            "content": "struct ConnectionPool { max_connections: usize }",
            "repo": "alpha",
            "path": "src/db.rs",
            "language": "rust"
        },
        {
            "id": "guide",
            "content": "Authentication guide: tokens expire after one hour.",
            "repo": "docs",
            "path": "guide/auth.md",
            "content_type": "doc",
            "language": "markdown"
        },
        {
            "id": "",
            "content": "missing identifier"
        }
    ]);
    let path = dir.join("corpus.json");
    std::fs::write(&path, serde_json::to_string(&corpus)?)?;
    Ok(path)
}

#[test]
fn search_renders_matching_fragment() -> Result<()> {
    let dir = TempDir::new()?;
    let corpus = write_corpus(dir.path())?;

    let mut cmd = coderag_command()?;
    cmd.args(["search", "connection pool", "--corpus"])
        .arg(&corpus)
        .assert()
        .success()
        .stdout(contains("alpha/src/db.rs").and(contains("ConnectionPool")));

    Ok(())
}

#[test]
fn search_json_lists_final_results() -> Result<()> {
    let dir = TempDir::new()?;
    let corpus = write_corpus(dir.path())?;

    let mut cmd = coderag_command()?;
    let output = cmd
        .args(["search", "authenticate token", "--json", "--corpus"])
        .arg(&corpus)
        .output()?;
    assert!(output.status.success());

    let parsed: JsonValue = serde_json::from_slice(&output.stdout)?;
    assert_eq!(parsed["query"], json!("authenticate token"));
    assert_eq!(parsed["finalResults"][0]["id"], json!("auth"));
    assert_eq!(parsed["vectorResults"], json!([]));

    Ok(())
}

#[test]
fn content_type_filter_limits_results() -> Result<()> {
    let dir = TempDir::new()?;
    let corpus = write_corpus(dir.path())?;

    let mut cmd = coderag_command()?;
    let output = cmd
        .args(["search", "authentication", "--content-type", "doc", "--json", "--corpus"])
        .arg(&corpus)
        .output()?;
    assert!(output.status.success());

    let parsed: JsonValue = serde_json::from_slice(&output.stdout)?;
    let ids: Vec<&str> = parsed["finalResults"]
        .as_array()
        .map(|results| results.iter().filter_map(|r| r["id"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec!["guide"]);

    Ok(())
}

#[test]
fn file_path_lists_fragments_without_query() -> Result<()> {
    let dir = TempDir::new()?;
    let corpus = write_corpus(dir.path())?;

    let mut cmd = coderag_command()?;
    let output = cmd
        .args(["search", "--file-path", "src/db.rs", "--json", "--corpus"])
        .arg(&corpus)
        .output()?;
    assert!(output.status.success());

    let parsed: JsonValue = serde_json::from_slice(&output.stdout)?;
    assert_eq!(parsed["finalResults"][0]["id"], json!("pool"));
    assert_eq!(parsed["finalResults"].as_array().map(Vec::len), Some(1));

    Ok(())
}

#[test]
fn blank_query_without_file_path_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let corpus = write_corpus(dir.path())?;

    let mut cmd = coderag_command()?;
    cmd.args(["search", "--corpus"])
        .arg(&corpus)
        .assert()
        .failure();

    Ok(())
}

#[test]
fn no_match_reports_empty_state() -> Result<()> {
    let dir = TempDir::new()?;
    let corpus = write_corpus(dir.path())?;

    let mut cmd = coderag_command()?;
    cmd.args(["search", "kubernetes", "--corpus"])
        .arg(&corpus)
        .assert()
        .success()
        .stdout(contains("No results found"));

    Ok(())
}

#[test]
fn stats_counts_skipped_documents() -> Result<()> {
    let dir = TempDir::new()?;
    let corpus = write_corpus(dir.path())?;

    let mut cmd = coderag_command()?;
    let output = cmd.args(["stats", "--json", "--corpus"]).arg(&corpus).output()?;
    assert!(output.status.success());

    let parsed: JsonValue = serde_json::from_slice(&output.stdout)?;
    assert_eq!(parsed["initialized"], json!(true));
    assert_eq!(parsed["lexical"]["indexed_documents"], json!(3));
    assert_eq!(parsed["lexical"]["skipped_documents"], json!(1));
    assert_eq!(parsed["config"]["lexical_weight"], json!(1.0));

    Ok(())
}

#[test]
fn config_file_overrides_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let corpus = write_corpus(dir.path())?;
    let config = dir.path().join("retrieval.toml");
    std::fs::write(
        &config,
        "vector_weight = 0.0\nlexical_weight = 1.0\nrerank_enabled = true\n\n[rerank_strategy]\ntype = \"score_based\"\n",
    )?;

    let mut cmd = coderag_command()?;
    let output = cmd
        .args(["stats", "--json", "--corpus"])
        .arg(&corpus)
        .arg("--config")
        .arg(&config)
        .output()?;
    assert!(output.status.success());

    let parsed: JsonValue = serde_json::from_slice(&output.stdout)?;
    assert_eq!(parsed["config"]["rerank_enabled"], json!(true));
    assert_eq!(parsed["config"]["rerank_strategy"]["type"], json!("score_based"));

    Ok(())
}

#[test]
fn invalid_config_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let corpus = write_corpus(dir.path())?;
    let config = dir.path().join("retrieval.toml");
    std::fs::write(&config, "vector_weight = 3.0\n")?;

    let mut cmd = coderag_command()?;
    cmd.args(["search", "pool", "--corpus"])
        .arg(&corpus)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("Failed to load config"));

    Ok(())
}

#[test]
fn missing_corpus_fails() -> Result<()> {
    let dir = TempDir::new()?;

    let mut cmd = coderag_command()?;
    cmd.args(["search", "pool", "--corpus"])
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(contains("Failed to read corpus"));

    Ok(())
}
