//! Optional TOML settings file.
//!
//! Every field is optional; command-line flags override whatever is set
//! here, and built-in defaults fill the rest.
//!
//! ```toml
//! script = "./test-root.sh"
//! shell = "bash"
//! timeout_secs = 30
//! crash_log = "./program_crash.log"
//!
//! [env]
//! RUST_BACKTRACE = "1"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub script: Option<PathBuf>,
    pub shell: Option<String>,
    pub timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub crash_log: Option<PathBuf>,
    pub working_directory: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_settings_are_all_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_parse_full_settings() {
        let settings = Settings::from_toml_str(
            r#"
script = "./ci.sh"
shell = "sh"
timeout_secs = 5
poll_interval_ms = 250
crash_log = "/tmp/crash.log"

[env]
MODE = "ci"
"#,
        )
        .unwrap();

        assert_eq!(settings.script, Some(PathBuf::from("./ci.sh")));
        assert_eq!(settings.shell.as_deref(), Some("sh"));
        assert_eq!(settings.timeout_secs, Some(5));
        assert_eq!(settings.poll_interval_ms, Some(250));
        assert_eq!(settings.crash_log, Some(PathBuf::from("/tmp/crash.log")));
        assert_eq!(settings.env.get("MODE").map(String::as_str), Some("ci"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = Settings::from_toml_str("timeout = 5").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout_secs = 7").unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.timeout_secs, Some(7));
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = Settings::load("/nonexistent/scriptward.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/scriptward.toml"));
    }
}
