//! Installs the crash guard and raises a fatal signal, so the guard can be
//! checked end to end from outside the process.

use clap::Parser;
use nix::sys::signal::{raise, SigSet, Signal};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "guard-probe")]
struct Args {
    /// Crash log path handed to the guard
    #[arg(long)]
    crash_log: PathBuf,

    /// Signal to raise, e.g. SIGSEGV
    #[arg(long, default_value = "SIGABRT")]
    signal: String,

    /// Raise the signal twice while it is blocked, then unblock it
    #[arg(long)]
    twice: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let signal = Signal::from_str(&args.signal)?;

    scriptward_guard::set_crash_log_path(&args.crash_log)?;
    scriptward_guard::install();

    if args.twice {
        let mut set = SigSet::empty();
        set.add(signal);
        set.thread_block()?;
        raise(signal)?;
        raise(signal)?;
        set.thread_unblock()?;
    } else {
        raise(signal)?;
    }

    // Only reached for signals the guard does not handle.
    Ok(())
}
