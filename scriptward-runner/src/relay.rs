//! Output relay: drains a child's stdout and stderr on dedicated threads and
//! forwards each line, tagged with its channel, to an [`OutputSink`].

use scriptward_core::console::{self, tagged_line};
use scriptward_core::Channel;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Destination for relayed script output and supervisor messages
pub trait OutputSink: Send + Sync + 'static {
    /// One line from the script, including its trailing newline if it had one
    fn relay(&self, channel: Channel, line: &[u8]);

    fn info(&self, message: &str);

    fn error(&self, message: &str);
}

/// Writes to the supervisor's own stdout/stderr with console tags
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSink;

impl OutputSink for TerminalSink {
    fn relay(&self, channel: Channel, line: &[u8]) {
        let bytes = tagged_line(channel.tag(), line);
        // One write per line under the stream lock keeps lines whole.
        let result = match channel {
            Channel::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(&bytes).and_then(|_| out.flush())
            }
            Channel::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(&bytes).and_then(|_| err.flush())
            }
        };
        if let Err(e) = result {
            debug!(channel = %channel, error = %e, "Failed to relay line");
        }
    }

    fn info(&self, message: &str) {
        console::info(message);
    }

    fn error(&self, message: &str) {
        console::error(message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Line(Channel, Vec<u8>),
    Info(String),
    Error(String),
}

/// Records everything in arrival order
#[derive(Debug, Default)]
pub struct CaptureSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().clone()
    }

    /// Concatenated output of one channel
    pub fn output(&self, channel: Channel) -> String {
        let events = self.lock();
        let mut bytes = Vec::new();
        for event in events.iter() {
            if let SinkEvent::Line(c, line) = event {
                if *c == channel {
                    bytes.extend_from_slice(line);
                }
            }
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SinkEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, event: SinkEvent) {
        self.lock().push(event);
    }
}

impl OutputSink for CaptureSink {
    fn relay(&self, channel: Channel, line: &[u8]) {
        self.push(SinkEvent::Line(channel, line.to_vec()));
    }

    fn info(&self, message: &str) {
        self.push(SinkEvent::Info(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(SinkEvent::Error(message.to_string()));
    }
}

/// The two drain threads of one child
pub(crate) struct Relays {
    stdout: JoinHandle<io::Result<u64>>,
    stderr: JoinHandle<io::Result<u64>>,
}

impl Relays {
    pub(crate) fn start<O, E>(stdout: O, stderr: E, sink: Arc<dyn OutputSink>) -> io::Result<Self>
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        let stdout = spawn_drain(stdout, Channel::Stdout, Arc::clone(&sink))?;
        let stderr = spawn_drain(stderr, Channel::Stderr, sink)?;
        Ok(Self { stdout, stderr })
    }

    /// Whether both channels reached end-of-stream
    pub(crate) fn is_finished(&self) -> bool {
        self.stdout.is_finished() && self.stderr.is_finished()
    }

    /// Wait until both channels are drained or `deadline` passes, checking
    /// every `poll_interval`. Returns whether the drains finished.
    pub(crate) fn wait_until(&self, deadline: Instant, poll_interval: Duration) -> bool {
        loop {
            if self.is_finished() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(poll_interval.min(deadline - now));
        }
    }

    /// Block until both channels reached end-of-stream
    pub(crate) fn join(self) {
        for (channel, handle) in [(Channel::Stdout, self.stdout), (Channel::Stderr, self.stderr)] {
            match handle.join() {
                Ok(Ok(bytes)) => debug!(channel = %channel, bytes, "Channel drained"),
                Ok(Err(e)) => warn!(channel = %channel, error = %e, "Channel closed with error"),
                Err(_) => warn!(channel = %channel, "Relay thread panicked"),
            }
        }
    }
}

fn spawn_drain<R>(
    reader: R,
    channel: Channel,
    sink: Arc<dyn OutputSink>,
) -> io::Result<JoinHandle<io::Result<u64>>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("relay-{}", channel))
        .spawn(move || drain(reader, channel, sink.as_ref()))
}

/// Forward `reader` line by line until EOF, returning the byte count
pub(crate) fn drain<R: Read>(reader: R, channel: Channel, sink: &dyn OutputSink) -> io::Result<u64> {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut total = 0u64;
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(total);
        }
        total += n as u64;
        sink.relay(channel, &line);
    }
}
