use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Runs the local shell with `script` on stdin inside `dir`.
fn run_rdsh(script: &str, dir: &TempDir) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_rdsh"))
        .current_dir(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start rdsh");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_bytes())
        .unwrap();
    child.wait_with_output().expect("Failed to wait for rdsh")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).replace("dsh4> ", "")
}

#[test]
fn test_two_stage_pipeline() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("words.txt"), "hello\nworld\nrust\n").unwrap();

    let output = run_rdsh("cat words.txt | grep rust\n", &dir);
    assert_eq!(stdout_of(&output), "rust\n\n");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_three_stage_pipeline() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("fruit.txt"), "apple\nbanana\napple\napple\nbanana\n").unwrap();

    let output = run_rdsh("cat fruit.txt | grep apple | wc -l\n", &dir);
    let count: i32 = stdout_of(&output).trim().parse().expect("Expected number");
    assert_eq!(count, 3);
}

#[test]
fn test_eight_stage_pipeline_is_allowed() {
    let dir = TempDir::new().unwrap();
    let output = run_rdsh("echo x | cat | cat | cat | cat | cat | cat | cat\n", &dir);
    assert_eq!(stdout_of(&output), "x\n\n");
}

#[test]
fn test_nine_stages_rejected() {
    let dir = TempDir::new().unwrap();
    let output = run_rdsh("echo x | cat | cat | cat | cat | cat | cat | cat | cat\n", &dir);
    assert_eq!(
        String::from_utf8_lossy(&output.stderr),
        "error: piping limited to 8 commands\n"
    );
    assert_eq!(stdout_of(&output), "\n");
}

#[test]
fn test_exit_status_of_last_stage() {
    let dir = TempDir::new().unwrap();
    let output = run_rdsh("echo hello | grep nomatch\nrc\n", &dir);
    assert_eq!(stdout_of(&output), "1\n\n");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_quoted_argument_keeps_spaces() {
    let dir = TempDir::new().unwrap();
    let output = run_rdsh("echo \"  hello   world  \" | cat\n", &dir);
    assert_eq!(stdout_of(&output), "  hello   world  \n\n");
}

#[test]
fn test_exit_builtin_ends_shell() {
    let dir = TempDir::new().unwrap();
    let output = run_rdsh("echo one\nexit\necho two\n", &dir);
    assert_eq!(stdout_of(&output), "one\n");
    assert!(output.status.success());
}

#[test]
fn test_cd_changes_where_pipelines_run() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub").join("marker"), "").unwrap();

    let output = run_rdsh("cd sub\nls\ncd ..\nls\n", &dir);
    assert_eq!(stdout_of(&output), "marker\nsub\n\n");
}

#[test]
fn test_command_not_found() {
    let dir = TempDir::new().unwrap();
    let output = run_rdsh("not-a-real-command-rdsh\nrc\n", &dir);
    assert_eq!(
        String::from_utf8_lossy(&output.stderr),
        "rdsh: not-a-real-command-rdsh: command not found\n"
    );
    assert_eq!(stdout_of(&output), "2\n\n");
}

/// Like `run_rdsh`, but with the descriptor limit lowered so pipe setup fails.
fn run_rdsh_with_fd_limit(script: &str, limit: u32, dir: &TempDir) -> Output {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(format!("ulimit -n {} && exec \"$0\"", limit))
        .arg(env!("CARGO_BIN_EXE_rdsh"))
        .current_dir(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start rdsh");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_bytes())
        .unwrap();
    child.wait_with_output().expect("Failed to wait for rdsh")
}

#[test]
fn test_pipe_exhaustion_aborts_only_that_line() {
    let dir = TempDir::new().unwrap();
    // Seven pipes need fourteen descriptors; only seven are free
    let output = run_rdsh_with_fd_limit(
        "echo x | cat | cat | cat | cat | cat | cat | cat\necho ok\n",
        10,
        &dir,
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: cannot run command:"), "got {stderr:?}");
    assert_eq!(stdout_of(&output), "ok\n\n");
    assert!(output.status.success());
}
