//! Fatal-signal guard.
//!
//! [`install`] routes the usual crash signals (SIGSEGV, SIGABRT, ...) to a
//! handler that prints a short diagnostic, appends it with a timestamp to
//! the crash log and exits with [`exit_code::FATAL_SIGNAL`]. The crash log
//! location is process-wide state set with [`set_crash_log_path`] before
//! supervision starts.
//!
//! [`exit_code::FATAL_SIGNAL`]: scriptward_core::exit_code::FATAL_SIGNAL

mod buf;
pub mod crash_log;
pub mod handler;
pub mod stack;

pub use crash_log::{crash_log_path, set_crash_log_path, GuardError, DEFAULT_CRASH_LOG};
pub use handler::{install, GUARDED_SIGNALS};
pub use stack::{capture_stack, StackCapture, MAX_FRAMES};
