use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ingest_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ingest");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(files_dir.join("empty.txt"), "").unwrap();
    fs::write(
        files_dir.join("notes.txt"),
        "Deployment notes.\n\nKubernetes and Docker are mentioned here.",
    )
    .unwrap();

    let config_content = r#"[chunking]
chunk_size = 1000
overlap = 200

[embedding]
provider = "disabled"

[store]
url_env = "INGEST_TEST_STORE_URL"

[logging]
level = "warn"
"#;

    let config_path = config_dir.join("ingest.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ingest(config_path: &Path, store_url: Option<&str>, args: &[&str]) -> (String, String, bool) {
    let binary = ingest_binary();
    let mut command = Command::new(&binary);
    command
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("INGEST_TEST_STORE_URL")
        .env_remove("RUST_LOG");
    if let Some(url) = store_url {
        command.env("INGEST_TEST_STORE_URL", url);
    }
    let output = command
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ingest binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help() {
    let output = Command::new(ingest_binary()).arg("--help").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("probe"));
    assert!(stdout.contains("files"));
    assert!(stdout.contains("search"));
}

#[cfg(feature = "sniff")]
#[test]
fn test_probe() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_ingest(&config_path, None, &["probe"]);
    assert!(success, "probe failed: {}", stderr);
    assert!(stdout.contains("content sniffing: ok (infer)"));
}

#[cfg(not(feature = "sniff"))]
#[test]
fn test_probe_without_sniffing_fails() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_ingest(&config_path, None, &["probe"]);
    assert!(!success);
    assert!(stderr.contains("missing capability"));
}

#[test]
fn test_files_requires_assistant_id() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/notes.txt");
    let (stdout, stderr, success) = run_ingest(
        &config_path,
        Some("memory://"),
        &["files", file.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("assistant_id must be provided"), "stderr: {}", stderr);
}

#[test]
fn test_files_checks_assistant_id_before_paths() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("ingest.toml");
    // Default provider: would need OPENAI_API_KEY if it were built.
    fs::write(&config_path, "[store]\nurl_env = \"INGEST_TEST_STORE_URL\"\n").unwrap();
    let missing = tmp.path().join("files/nope.pdf");

    let output = Command::new(ingest_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(["files", missing.to_str().unwrap()])
        .env_remove("OPENAI_API_KEY")
        .env_remove("INGEST_TEST_STORE_URL")
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("assistant_id must be provided"), "stderr: {}", stderr);
    assert!(!stderr.contains("nope.pdf"));
    assert!(!stderr.contains("OPENAI_API_KEY"));
}

#[cfg(feature = "sniff")]
#[test]
fn test_files_requires_store_url() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/notes.txt");
    let (_, stderr, success) = run_ingest(
        &config_path,
        None,
        &["files", "--assistant-id", "asst_1", file.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("INGEST_TEST_STORE_URL"), "stderr: {}", stderr);
}

#[cfg(feature = "sniff")]
#[test]
fn test_files_empty_upload_has_no_records() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/empty.txt");
    let (stdout, stderr, success) = run_ingest(
        &config_path,
        Some("memory://"),
        &["files", "--assistant-id", "asst_1", file.to_str().unwrap()],
    );
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.trim().is_empty());
    assert!(stderr.contains("Ingested 1 file(s), 0 record(s)"));
}

#[cfg(feature = "sniff")]
#[test]
fn test_files_with_disabled_embeddings_fails() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/notes.txt");
    let (stdout, stderr, success) = run_ingest(
        &config_path,
        Some("memory://"),
        &["files", "--assistant-id", "asst_1", file.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[cfg(feature = "sniff")]
#[test]
fn test_missing_file_reports_path() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("files/nope.pdf");
    let (_, stderr, success) = run_ingest(
        &config_path,
        Some("memory://"),
        &["files", "--assistant-id", "asst_1", missing.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("nope.pdf"));
}

#[test]
fn test_search_empty_index() {
    let (tmp, config_path) = setup_test_env();
    let db = tmp.path().join("data/vectors.db");
    let url = format!("sqlite://{}", db.display());
    let (stdout, stderr, success) = run_ingest(
        &config_path,
        Some(&url),
        &["search", "--assistant-id", "asst_1", "deployment"],
    );
    // The disabled embedder cannot embed the query.
    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("embedding failed"), "stderr: {}", stderr);
    assert!(db.exists());
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap();
    let (_, stderr, success) = run_ingest(&config_path, None, &["probe"]);
    assert!(!success);
    assert!(stderr.contains("overlap"));
}
