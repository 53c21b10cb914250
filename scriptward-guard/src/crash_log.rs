//! Process-wide crash log location and the append-only entry writer.
//!
//! The path is kept as a leaked C string behind an atomic pointer so the
//! signal handler can read it without locking or allocating. Set it before
//! supervision begins; changing it while a handler is running is not
//! supported.

use chrono::{DateTime, TimeZone};
use std::ffi::{CStr, CString, OsStr};
use std::fmt::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::buf::{write_fd, LineBuf};

/// Crash log used until [`set_crash_log_path`] is called.
pub const DEFAULT_CRASH_LOG: &str = "./program_crash.log";

const DEFAULT_CRASH_LOG_C: &[u8] = b"./program_crash.log\0";

/// Longest entry written to the log; longer messages are truncated.
pub(crate) const ENTRY_CAPACITY: usize = 1024;

static LOG_PATH: AtomicPtr<libc::c_char> = AtomicPtr::new(ptr::null_mut());

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Crash log path contains a NUL byte: {0}")]
    InvalidPath(String),
}

/// Point the crash log at `path`.
///
/// The previous path string is intentionally leaked: a handler on another
/// thread may still be reading it.
pub fn set_crash_log_path<P: AsRef<Path>>(path: P) -> Result<(), GuardError> {
    let path = path.as_ref();
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| GuardError::InvalidPath(path.display().to_string()))?;
    LOG_PATH.store(c_path.into_raw(), Ordering::SeqCst);
    debug!(crash_log = %path.display(), "Crash log path set");
    Ok(())
}

/// Current crash log path.
pub fn crash_log_path() -> PathBuf {
    PathBuf::from(OsStr::from_bytes(crash_log_path_cstr().to_bytes()))
}

pub(crate) fn crash_log_path_cstr() -> &'static CStr {
    let raw = LOG_PATH.load(Ordering::SeqCst);
    if raw.is_null() {
        // SAFETY: the constant is NUL-terminated with no interior NUL.
        unsafe { CStr::from_bytes_with_nul_unchecked(DEFAULT_CRASH_LOG_C) }
    } else {
        // SAFETY: only ever set from `CString::into_raw`, and never freed.
        unsafe { CStr::from_ptr(raw) }
    }
}

/// Render `[YYYY-MM-DD HH:MM:SS] ` into `out`.
pub(crate) fn write_timestamp<Tz, W>(out: &mut W, at: &DateTime<Tz>) -> fmt::Result
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
    W: Write,
{
    write!(out, "[{}] ", at.format("%Y-%m-%d %H:%M:%S"))
}

/// An open crash log, closed on drop.
pub(crate) struct CrashLog {
    fd: libc::c_int,
}

impl CrashLog {
    /// Open `path` for append, creating it if needed.
    pub(crate) fn open(path: &CStr) -> Option<Self> {
        let fd = unsafe {
            libc::open(
                path.as_ptr(),
                libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND | libc::O_CLOEXEC,
                0o644 as libc::c_uint,
            )
        };
        (fd >= 0).then_some(Self { fd })
    }

    /// Append one timestamped entry. Each entry is a single `write` so
    /// concurrent appenders never split a line.
    pub(crate) fn append(&self, message: &[u8]) {
        let mut entry = LineBuf::<ENTRY_CAPACITY>::new();
        let _ = write_timestamp(&mut entry, &chrono::Local::now());
        entry.push_bytes(message);
        entry.terminate_line();
        write_fd(self.fd, entry.as_bytes());
    }
}

impl Drop for CrashLog {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_timestamp_format() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap()
            .and_utc();
        let mut out = String::new();
        write_timestamp(&mut out, &at).unwrap();
        assert_eq!(out, "[2024-03-09 07:05:01] ");
    }

    #[test]
    fn test_append_writes_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crash.log");
        let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();

        let log = CrashLog::open(&c_path).expect("log should open");
        log.append(b"Fatal error (11), the program has been stopped.");
        log.append(b"Stack trace not available.");
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert_eq!(&lines[0][20..22], "] ");
        assert!(lines[0].ends_with("Fatal error (11), the program has been stopped."));
        assert!(lines[1].ends_with("Stack trace not available."));
    }

    #[test]
    fn test_oversized_entry_keeps_its_own_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crash.log");
        let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();

        let log = CrashLog::open(&c_path).expect("log should open");
        log.append(&[b'a'; 1010]);
        log.append(&[b'b'; 4096]);
        log.append(b"Stack trace:");
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with('a'));
        assert_eq!(lines[1].len(), ENTRY_CAPACITY - 1);
        assert!(lines[2].ends_with("] Stack trace:"));
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_open_fails_in_missing_directory() {
        let c_path = CString::new("/nonexistent-scriptward-dir/crash.log").unwrap();
        assert!(CrashLog::open(&c_path).is_none());
    }

    #[test]
    fn test_set_path_is_visible_to_handler() {
        set_crash_log_path("/tmp/scriptward-unit/crash.log").unwrap();
        assert_eq!(crash_log_path(), PathBuf::from("/tmp/scriptward-unit/crash.log"));
        assert_eq!(
            crash_log_path_cstr().to_bytes(),
            b"/tmp/scriptward-unit/crash.log"
        );
    }

    #[test]
    fn test_path_rejects_interior_nul() {
        let err = set_crash_log_path("bad\0path").unwrap_err();
        assert!(matches!(err, GuardError::InvalidPath(_)));
    }
}
