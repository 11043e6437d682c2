//! Destination of flushed script output.
//!
//! When the root context flushes its buffer, the text goes to the runtime's
//! sink: stdout for embedders, a capture buffer for tests, or nowhere.
//!
//! # Performance
//! Enum dispatch; no vtable on the flush path.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

/// Where the root context's output ends up.
pub enum OutputSink {
    /// Writes to stdout (default).
    Stdout,
    /// Captures output in memory.
    Buffer(Mutex<String>),
    /// Discards everything.
    Silent,
}

impl OutputSink {
    /// Append text.
    pub fn write(&self, text: &str) {
        match self {
            Self::Stdout => {
                let mut stdout = std::io::stdout().lock();
                if let Err(error) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
                    tracing::warn!(%error, "failed to write script output");
                }
            }
            Self::Buffer(buffer) => buffer.lock().push_str(text),
            Self::Silent => {}
        }
    }

    /// Everything captured so far. Empty unless this is a buffer sink.
    pub fn captured(&self) -> String {
        match self {
            Self::Buffer(buffer) => buffer.lock().clone(),
            Self::Stdout | Self::Silent => String::new(),
        }
    }

    /// Drop captured output.
    pub fn clear(&self) {
        if let Self::Buffer(buffer) = self {
            buffer.lock().clear();
        }
    }
}

/// Shared output sink.
pub type SharedOutputSink = Arc<OutputSink>;

/// Create a stdout sink.
pub fn stdout_sink() -> SharedOutputSink {
    Arc::new(OutputSink::Stdout)
}

/// Create a capturing sink.
pub fn buffer_sink() -> SharedOutputSink {
    Arc::new(OutputSink::Buffer(Mutex::new(String::new())))
}

/// Create a sink that discards output.
pub fn silent_sink() -> SharedOutputSink {
    Arc::new(OutputSink::Silent)
}
