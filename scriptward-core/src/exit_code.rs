//! Process exit codes of the supervisor. These values are part of the
//! external contract and must not change.

/// Supervision completed, whatever the script itself returned.
pub const SUCCESS: i32 = 0;

/// The child or its output channels could not be created, or reaping failed.
pub const SPAWN_FAILURE: i32 = 1;

/// Bad command line or unreadable settings file.
pub const USAGE: i32 = 2;

/// A timed-out child could not be forcibly terminated.
pub const KILL_FAILURE: i32 = 4;

/// The crash log could not be opened while handling a fatal signal.
pub const CRASH_LOG_UNWRITABLE: i32 = 123;

/// A fatal signal was handled and diagnostics were captured.
pub const FATAL_SIGNAL: i32 = 127;
