//! Fatal-signal handler registration and the handler itself.

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::ffi::CStr;
use std::fmt::Write;
use tracing::{debug, warn};

use scriptward_core::console::ERROR_TAG;
use scriptward_core::exit_code;

use crate::buf::{write_line, LineBuf};
use crate::crash_log::{crash_log_path_cstr, CrashLog, ENTRY_CAPACITY};
use crate::stack::{capture_stack, StackCapture, MAX_FRAMES};

/// Signals routed to the crash handler by [`install`].
pub const GUARDED_SIGNALS: [Signal; 10] = [
    Signal::SIGABRT,
    Signal::SIGBUS,
    Signal::SIGFPE,
    Signal::SIGILL,
    Signal::SIGQUIT,
    Signal::SIGSEGV,
    Signal::SIGSYS,
    Signal::SIGTRAP,
    Signal::SIGXCPU,
    Signal::SIGXFSZ,
];

const CMDLINE_CAPACITY: usize = 1024;

/// Register the crash handler for every signal in [`GUARDED_SIGNALS`].
///
/// Registration failures are logged and otherwise ignored.
pub fn install() {
    let action = SigAction::new(
        SigHandler::Handler(on_fatal_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in GUARDED_SIGNALS {
        // SAFETY: the handler only touches stack buffers, raw descriptors
        // and the atomically published crash log path.
        match unsafe { sigaction(signal, &action) } {
            Ok(_) => debug!(signal = ?signal, "Crash handler installed"),
            Err(err) => warn!(signal = ?signal, error = %err, "Failed to install crash handler"),
        }
    }
}

extern "C" fn on_fatal_signal(signum: libc::c_int) {
    // A repeat of this signal must take the default action, not re-enter.
    unsafe {
        libc::signal(signum, libc::SIG_DFL);
    }

    let mut cmdline = LineBuf::<CMDLINE_CAPACITY>::new();
    read_cmdline(&mut cmdline);

    let mut message = LineBuf::<128>::new();
    let _ = write!(
        message,
        "Fatal error ({}), the program has been stopped.",
        signum
    );
    write_line(libc::STDOUT_FILENO, message.as_bytes());

    let mut command = LineBuf::<ENTRY_CAPACITY>::new();
    if !cmdline.is_empty() {
        command.push_bytes(b"Command line: ");
        command.push_bytes(cmdline.as_bytes());
        write_line(libc::STDOUT_FILENO, command.as_bytes());
    }

    let path = crash_log_path_cstr();
    let Some(log) = CrashLog::open(path) else {
        let mut line = LineBuf::<ENTRY_CAPACITY>::new();
        let _ = write!(line, "{} Failed to open crash log ", ERROR_TAG);
        line.push_bytes(path.to_bytes());
        write_line(libc::STDERR_FILENO, line.as_bytes());
        unsafe { libc::_exit(exit_code::CRASH_LOG_UNWRITABLE) };
    };

    log.append(message.as_bytes());
    if !command.is_empty() {
        log.append(command.as_bytes());
    }
    print_log_location(path);

    match capture_stack(MAX_FRAMES) {
        StackCapture::Frames(frames) => {
            write_line(libc::STDOUT_FILENO, b"Stack trace:");
            log.append(b"Stack trace:");
            for frame in &frames {
                write_line(libc::STDOUT_FILENO, frame.as_bytes());
                log.append(frame.as_bytes());
            }
        }
        StackCapture::Unsupported => {
            write_line(libc::STDOUT_FILENO, b"Stack trace not available.");
            log.append(b"Stack trace not available.");
        }
    }

    drop(log);
    unsafe { libc::_exit(exit_code::FATAL_SIGNAL) };
}

/// Best-effort snapshot of `/proc/self/cmdline`; leaves `out` empty on failure.
fn read_cmdline(out: &mut LineBuf<CMDLINE_CAPACITY>) {
    let fd = unsafe {
        libc::open(
            b"/proc/self/cmdline\0".as_ptr().cast(),
            libc::O_RDONLY | libc::O_CLOEXEC,
        )
    };
    if fd < 0 {
        return;
    }
    let mut raw = [0u8; CMDLINE_CAPACITY];
    let n = unsafe { libc::read(fd, raw.as_mut_ptr().cast(), raw.len()) };
    unsafe { libc::close(fd) };
    if n > 0 {
        render_cmdline(&raw[..n as usize], out);
    }
}

/// Arguments in `/proc/self/cmdline` are NUL-separated; join them with spaces.
fn render_cmdline<const N: usize>(raw: &[u8], out: &mut LineBuf<N>) {
    let raw = match raw.iter().rposition(|&b| b != 0) {
        Some(last) => &raw[..=last],
        None => return,
    };
    for (i, arg) in raw.split(|&b| b == 0).enumerate() {
        if i > 0 {
            out.push_bytes(b" ");
        }
        out.push_bytes(arg);
    }
}

fn print_log_location(path: &CStr) {
    let mut line = LineBuf::<ENTRY_CAPACITY>::new();
    line.push_bytes(b"Log file path: ");
    let mut bytes = path.to_bytes();
    if bytes.first() != Some(&b'/') {
        let mut cwd = [0u8; 512];
        let found = unsafe { !libc::getcwd(cwd.as_mut_ptr().cast(), cwd.len()).is_null() };
        if let (true, Ok(cwd)) = (found, CStr::from_bytes_until_nul(&cwd)) {
            line.push_bytes(cwd.to_bytes());
            line.push_bytes(b"/");
            bytes = bytes.strip_prefix(b"./").unwrap_or(bytes);
        }
    }
    line.push_bytes(bytes);
    write_line(libc::STDOUT_FILENO, line.as_bytes());
}
