//! Console tags used on the supervisor's standard streams.
//!
//! Relayed script output and the supervisor's own messages share the same
//! terminal, so every line carries one of these tags.

use std::fmt::Display;

/// Relayed child stdout.
pub const SCRIPT_STDOUT_TAG: &str = "[SHINFO]";
/// Relayed child stderr.
pub const SCRIPT_STDERR_TAG: &str = "[SHERR]";
pub const INFO_TAG: &str = "[INFO]";
pub const ERROR_TAG: &str = "[ERROR]";

/// Print a supervisor informational line to stdout.
pub fn info(message: impl Display) {
    println!("{} {}", INFO_TAG, message);
}

/// Print a supervisor error line to stderr.
pub fn error(message: impl Display) {
    eprintln!("{} {}", ERROR_TAG, message);
}

/// Build `<tag> <line>\n` as a single buffer so it can be written in one call.
///
/// A trailing newline on `line` is kept as is; a missing one is appended.
pub fn tagged_line(tag: &str, line: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(tag.len() + line.len() + 2);
    out.extend_from_slice(tag.as_bytes());
    out.push(b' ');
    out.extend_from_slice(line);
    if line.last() != Some(&b'\n') {
        out.push(b'\n');
    }
    out
}
