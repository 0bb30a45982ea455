use std::time::Duration;
use tempfile::tempdir;
use tokio::process::Command;
use tokio::time;

const TIMEOUT_2_SEC: Duration = Duration::from_millis(2000);

fn pipemux() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pipemux"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[tokio::test]
pub async fn test_usage_without_arguments() {
    let output = time::timeout(TIMEOUT_2_SEC, pipemux().output())
        .await
        .unwrap()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Usage: pipemux PATH..."));
}

#[tokio::test]
pub async fn test_merges_files_to_stdout() {
    let dir = tempdir().unwrap();
    let file_a = dir.path().join("a.log");
    let file_b = dir.path().join("b.log");
    std::fs::write(&file_a, b"alpha\nbeta\n").unwrap();
    std::fs::write(&file_b, b"gamma\n").unwrap();

    let output = time::timeout(
        TIMEOUT_2_SEC,
        pipemux().arg(&file_a).arg(&file_b).output(),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut lines: Vec<&str> = stdout.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["alpha", "beta", "gamma"]);
    assert!(output.stderr.is_empty());
}

#[tokio::test]
pub async fn test_missing_path_exits_nonzero() {
    let dir = tempdir().unwrap();
    let present = dir.path().join("present.log");
    let missing = dir.path().join("missing.log");
    std::fs::write(&present, b"here\n").unwrap();

    let output = time::timeout(
        TIMEOUT_2_SEC,
        pipemux().arg(&present).arg(&missing).output(),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains(missing.to_str().unwrap()));
    assert!(stderr.contains("pipemux: cannot open"));
}
