// Process configuration for supervised script runs

use scriptward_core::{Settings, SupervisorError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Poll period of the bounded wait when nothing else is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Shell the script is handed to, as `<shell> <script>`
    pub shell: PathBuf,
    /// `None` waits for the script indefinitely
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub env: Vec<(String, String)>,
    pub working_directory: Option<PathBuf>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            env: Vec::new(),
            working_directory: None,
        }
    }
}

impl ProcessConfig {
    pub fn with_shell<P: AsRef<Path>>(mut self, shell: P) -> Self {
        self.shell = resolve_shell(shell.as_ref());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_working_directory<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.working_directory = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Apply the values present in a settings file on top of `self`
    pub fn apply_settings(mut self, settings: &Settings) -> Self {
        if let Some(shell) = &settings.shell {
            self = self.with_shell(shell);
        }
        if let Some(secs) = settings.timeout_secs {
            self.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(ms) = settings.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(dir) = &settings.working_directory {
            self.working_directory = Some(dir.clone());
        }
        self.env.extend(settings.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.poll_interval.is_zero() {
            return Err(SupervisorError::InvalidConfiguration(
                "poll interval must be positive".to_string(),
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(SupervisorError::InvalidConfiguration(
                "timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// `bash` from PATH, or `/bin/sh` when bash is not installed
pub fn default_shell() -> PathBuf {
    which::which("bash").unwrap_or_else(|_| PathBuf::from("/bin/sh"))
}

fn resolve_shell(shell: &Path) -> PathBuf {
    if shell.components().count() > 1 {
        return shell.to_path_buf();
    }
    which::which(shell).unwrap_or_else(|_| shell.to_path_buf())
}
