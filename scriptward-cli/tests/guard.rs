use nix::sys::signal::{kill, Signal};
use nix::sys::stat::Mode;
use nix::unistd::{mkfifo, Pid};
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn probe(dir: &Path, crash_log: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_guard-probe"))
        .current_dir(dir)
        .arg("--crash-log")
        .arg(crash_log)
        .args(extra)
        .output()
        .expect("guard-probe should start")
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// `[YYYY-MM-DD HH:MM:SS] ` prefix
fn has_timestamp(line: &str) -> bool {
    let b = line.as_bytes();
    b.len() > 22
        && b[0] == b'['
        && b[5] == b'-'
        && b[8] == b'-'
        && b[11] == b' '
        && b[14] == b':'
        && b[17] == b':'
        && &line[20..22] == "] "
}

#[test]
fn test_abort_is_logged_and_exits_127() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("crash.log");

    let output = probe(dir.path(), &log_path, &["--signal", "SIGABRT"]);

    assert_eq!(output.status.code(), Some(127));
    let stdout = text(&output.stdout);
    assert!(stdout.contains("Fatal error (6), the program has been stopped."));
    assert!(stdout.contains("Command line: "));
    assert!(stdout.contains(&format!("Log file path: {}", log_path.display())));

    let log = fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert!(lines.iter().all(|l| has_timestamp(l)), "log: {}", log);
    assert!(lines[0].ends_with("Fatal error (6), the program has been stopped."));
    assert!(log.contains("Stack trace:") || log.contains("Stack trace not available."));
}

#[test]
fn test_segv_number_is_reported() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("crash.log");

    let output = probe(dir.path(), &log_path, &["--signal", "SIGSEGV"]);

    assert_eq!(output.status.code(), Some(127));
    assert!(fs::read_to_string(&log_path)
        .unwrap()
        .contains("Fatal error (11), the program has been stopped."));
}

#[test]
fn test_signal_pending_while_blocked_is_handled_once() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("crash.log");

    let output = probe(dir.path(), &log_path, &["--signal", "SIGQUIT", "--twice"]);

    assert_eq!(output.status.code(), Some(127));
    let log = fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.matches("Fatal error (3)").count(), 1);
    let stack_headers = log.matches("Stack trace:").count() + log.matches("Stack trace not available.").count();
    assert_eq!(stack_headers, 1);
}

#[test]
fn test_second_signal_during_handler_takes_default_action() {
    let dir = TempDir::new().unwrap();
    // Opening a FIFO with no reader blocks, holding the handler mid-run.
    let fifo = dir.path().join("crash.fifo");
    mkfifo(&fifo, Mode::S_IRUSR | Mode::S_IWUSR).unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_guard-probe"))
        .current_dir(dir.path())
        .arg("--crash-log")
        .arg(&fifo)
        .args(["--signal", "SIGQUIT"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut first = String::new();
    stdout.read_line(&mut first).unwrap();
    assert_eq!(first.trim_end(), "Fatal error (3), the program has been stopped.");

    kill(Pid::from_raw(child.id() as i32), Signal::SIGQUIT).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            break child.wait().unwrap();
        }
        thread::sleep(Duration::from_millis(20));
    };

    let mut rest = String::new();
    stdout.read_to_string(&mut rest).unwrap();
    assert_eq!(status.signal(), Some(Signal::SIGQUIT as i32), "status: {:?}", status);
    assert_eq!(rest.matches("Fatal error").count(), 0);
}

#[test]
fn test_existing_log_is_appended() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("crash.log");
    fs::write(&log_path, "[2024-01-01 00:00:00] earlier entry\n").unwrap();

    probe(dir.path(), &log_path, &["--signal", "SIGFPE"]);

    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.starts_with("[2024-01-01 00:00:00] earlier entry\n"));
    assert!(log.contains("Fatal error (8)"));
}

#[test]
fn test_unwritable_log_exits_123() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("missing-dir").join("crash.log");

    let output = probe(dir.path(), &log_path, &["--signal", "SIGBUS"]);

    assert_eq!(output.status.code(), Some(123));
    assert!(text(&output.stdout).contains("Fatal error (7), the program has been stopped."));
    assert!(text(&output.stderr).contains("[ERROR] Failed to open crash log"));
    assert!(!log_path.exists());
}

#[test]
fn test_relative_log_resolves_against_working_directory() {
    let dir = TempDir::new().unwrap();
    let cwd = dir.path().canonicalize().unwrap();

    let output = probe(&cwd, Path::new("./program_crash.log"), &["--signal", "SIGTRAP"]);

    assert_eq!(output.status.code(), Some(127));
    assert!(cwd.join("program_crash.log").exists());
    assert!(text(&output.stdout).contains(&format!(
        "Log file path: {}/program_crash.log",
        cwd.display()
    )));
}

#[test]
fn test_unguarded_signal_is_not_intercepted() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("crash.log");

    // SIGWINCH is ignored by default and is not in the guarded set.
    let output = probe(dir.path(), &log_path, &["--signal", "SIGWINCH"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(!log_path.exists());
}
