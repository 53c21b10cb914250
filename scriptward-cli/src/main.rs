use clap::Parser;
use scriptward_core::{console, exit_code, RunReport, Settings, SettingsError, SupervisorError};
use scriptward_guard::{GuardError, DEFAULT_CRASH_LOG};
use scriptward_runner::{ProcessConfig, Supervisor};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::debug;

/// Script run when none is given on the command line or in settings
const DEFAULT_SCRIPT: &str = "./test-root.sh";

#[derive(Parser)]
#[command(name = "scriptward")]
#[command(about = "Run a shell script under supervision, with crash diagnostics", long_about = None)]
struct Cli {
    /// Script to run (defaults to ./test-root.sh)
    script: Option<PathBuf>,

    /// Kill the script after this many seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// How often a timed run checks on the script, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Shell used to invoke the script (defaults to bash, then /bin/sh)
    #[arg(long)]
    shell: Option<String>,

    /// Crash log written if the supervisor dies from a fatal signal
    #[arg(long)]
    crash_log: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            console::error(format!("{:#}", e));
            failure_code(&e)
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let crash_log = cli
        .crash_log
        .or_else(|| settings.crash_log.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CRASH_LOG));
    scriptward_guard::set_crash_log_path(&crash_log)?;
    scriptward_guard::install();

    let mut config = ProcessConfig::default().apply_settings(&settings);
    if let Some(shell) = &cli.shell {
        config = config.with_shell(shell);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Some(Duration::from_secs(secs)));
    }
    if let Some(ms) = cli.poll_interval_ms {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }
    debug!(?config, crash_log = %crash_log.display(), "Supervisor configured");

    let script = cli
        .script
        .or(settings.script)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT));

    let report = Supervisor::new().with_config(config).execute(&script)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    console::info(format!(
        "Run {} finished in {} ms",
        report.run_id, report.duration_ms
    ));
}

fn failure_code(error: &anyhow::Error) -> i32 {
    if let Some(e) = error.downcast_ref::<SupervisorError>() {
        e.exit_code()
    } else if error.downcast_ref::<SettingsError>().is_some()
        || error.downcast_ref::<GuardError>().is_some()
    {
        exit_code::USAGE
    } else {
        exit_code::SPAWN_FAILURE
    }
}
