//! Timestamped log stream and tracing setup
//!
//! Every playback message is written as `[YYYY-MM-DD HH:MM:SS]<message>` to the
//! console and mirrored as a TRACE event on the `adbplay::diagnostic` target.

use chrono::{DateTime, Local};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the configuration provide one
pub const DEFAULT_LOG_FILTER: &str = "info,adbplay::diagnostic=trace";

/// Format the line prefix for `now`
pub fn timestamp(now: DateTime<Local>) -> String {
    now.format("[%Y-%m-%d %H:%M:%S]").to_string()
}

/// Initialize the global tracing subscriber (stderr).
///
/// `RUST_LOG` wins over `filter`.
pub fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // try_init: a second initialization (tests) is not an error worth surfacing
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

type Console = Arc<Mutex<Box<dyn Write + Send>>>;

/// Console + diagnostic log sink shared by the main task and subsystem threads
#[derive(Clone)]
pub struct LogStream {
    console: Console,
}

impl LogStream {
    /// Console on standard output
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            console: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// In-memory console for inspecting output
    pub fn capture() -> (Self, LogCapture) {
        let capture = LogCapture::default();
        (Self::with_writer(capture.clone()), capture)
    }

    /// Emit one timestamped line to both sinks
    pub fn line(&self, message: impl fmt::Display) {
        let message = message.to_string();
        let stamp = timestamp(Local::now());

        if let Ok(mut console) = self.console.lock() {
            let _ = writeln!(console, "{}{}", stamp, message);
            let _ = console.flush();
        }

        tracing::trace!(target: "adbplay::diagnostic", "{}", message);
    }
}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream").finish_non_exhaustive()
    }
}

/// Shared buffer behind [`LogStream::capture`]
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Raw lines including timestamps
    pub fn lines(&self) -> Vec<String> {
        let buffer = self.buffer.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&buffer)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Lines with the `[...]` timestamp prefix removed
    pub fn messages(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .map(|line| match line.find(']') {
                Some(end) if line.starts_with('[') => line[end + 1..].to_string(),
                _ => line,
            })
            .collect()
    }

    /// Whether any message starts with `prefix`
    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.messages().iter().any(|m| m.starts_with(prefix))
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log capture poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
