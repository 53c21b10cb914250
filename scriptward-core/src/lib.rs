//! Shared types for the scriptward supervisor: run outcomes, the error
//! taxonomy with its process exit codes, console tags and settings.

pub mod console;
pub mod error;
pub mod exit_code;
pub mod models;
pub mod settings;

pub use error::{Result, SupervisorError};
pub use models::{Channel, ExitOutcome, RunReport};
pub use settings::{Settings, SettingsError};
