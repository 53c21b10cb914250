//! Child supervision: spawn a script through a shell, relay its output with
//! channel tags, and wait for it with or without a timeout.

pub mod process;
pub mod relay;
pub mod supervisor;

pub use process::ProcessConfig;
pub use relay::{CaptureSink, OutputSink, SinkEvent, TerminalSink};
pub use supervisor::{classify, monitor, wait_blocking, Supervisor};
