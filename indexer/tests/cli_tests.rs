use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn indexer(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_indexer")).args(args).output().unwrap()
}

fn write_dump(dir: &Path) -> String {
    let lines = [
        r#"{"id":"1","url":"https://a.edu/reefs","title":"Coral Reefs","text":"coral reef ecosystems support marine biodiversity and reef fish","depth":0,"domain":"a.edu","links":["https://b.gov/deserts","https://c.org/elsewhere"]}"#,
        r#"{"id":"2","url":"https://b.gov/deserts","title":"Deserts","text":"desert climate shapes sand dunes and sparse vegetation","depth":1,"domain":"b.gov","links":["https://a.edu/reefs"]}"#,
        r#"{"id":"3","url":"https://b.gov/oceans","title":"","text":"ocean currents move warm water toward the reef","depth":1,"domain":"b.gov"}"#,
    ];
    let path = dir.join("crawl.jsonl");
    fs::write(&path, lines.join("\n")).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn builds_then_searches() {
    let dir = tempdir().unwrap();
    let dump = write_dump(dir.path());
    let index = dir.path().join("index");
    let index = index.to_str().unwrap();

    let out = indexer(&["build", "--input", &dump, "--output", index]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = indexer(&["search", "--index", index, "--q", "coral reef", "--k", "5"]);
    assert!(out.status.success());
    let json: Value = serde_json::from_slice(&out.stdout).unwrap();
    let hits = json["hits"].as_array().unwrap();
    assert_eq!(hits[0]["url"], "https://a.edu/reefs");
    assert!(hits.iter().all(|h| h["url"] != "https://b.gov/deserts"));
    assert!(json.get("context").is_none());

    let out = indexer(&["search", "--index", index, "--q", "reef", "--context-chars", "40"]);
    let json: Value = serde_json::from_slice(&out.stdout).unwrap();
    let ctx = json["context"].as_array().unwrap();
    assert!(!ctx.is_empty());
    assert!(ctx.iter().all(|c| c["text"].as_str().unwrap().chars().count() <= 40));

    let out = indexer(&["info", "--index", index]);
    let meta: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(meta["num_docs"], 3);
    assert_eq!(meta["num_edges"], 3);
}

#[test]
fn degenerate_query_prints_no_hits() {
    let dir = tempdir().unwrap();
    let dump = write_dump(dir.path());
    let index = dir.path().join("index");
    let index = index.to_str().unwrap();
    assert!(indexer(&["build", "--input", &dump, "--output", index]).status.success());

    let out = indexer(&["search", "--index", index, "--q", "the and of"]);
    assert!(out.status.success());
    let json: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(json["hits"].as_array().unwrap().is_empty());
}

#[test]
fn missing_index_asks_for_rebuild() {
    let dir = tempdir().unwrap();
    let out = indexer(&["search", "--index", dir.path().to_str().unwrap(), "--q", "reef"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("index unavailable"));
    assert!(stderr.contains("rebuild"));
}

#[test]
fn build_reads_a_directory_of_dumps() {
    let dir = tempdir().unwrap();
    let dumps = dir.path().join("dumps");
    fs::create_dir_all(&dumps).unwrap();
    write_dump(&dumps);
    fs::write(
        dumps.join("extra.json"),
        r#"[{"id":"4","url":"https://a.edu/kelp","title":"Kelp","text":"kelp forests shelter reef species"}]"#,
    )
    .unwrap();
    let index = dir.path().join("index");
    let out = indexer(&["build", "--input", dumps.to_str().unwrap(), "--output", index.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = indexer(&["info", "--index", index.to_str().unwrap()]);
    let meta: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(meta["num_docs"], 4);
}
