//! Delivery targets for filtered lines.
//!
//! A sender is fire-and-forget: it takes one line and returns nothing.
//! Delivery failures are logged by the sender and never reach the tailer.

mod webhook;

use std::io::Write;
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

pub use webhook::{WebhookFormat, WebhookSender};

/// Accepts filtered lines.
pub trait LineSender: Send + Sync {
    fn send(&self, line: &str);

    /// Short name for logging.
    fn name(&self) -> &str {
        "sender"
    }
}

/// Shared sender handle, as bound to an observed root.
pub type SharedSender = Arc<dyn LineSender>;

/// Writes each line followed by a newline to a writer.
pub struct WriterSender {
    name: String,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl WriterSender {
    pub fn new(name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new("stdout", std::io::stdout())
    }
}

impl LineSender for WriterSender {
    fn send(&self, line: &str) {
        let mut writer = self.writer.lock();
        let result = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush());
        if let Err(e) = result {
            tracing::warn!("[{}] write failed: {e}", self.name);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Forwards lines into a channel.
#[derive(Clone)]
pub struct ChannelSender {
    tx: Sender<String>,
}

impl ChannelSender {
    pub fn new(tx: Sender<String>) -> Self {
        Self { tx }
    }
}

impl LineSender for ChannelSender {
    fn send(&self, line: &str) {
        if self.tx.send(line.to_string()).is_err() {
            crate::debug_event!("channel", "dropped", "receiver gone");
        }
    }

    fn name(&self) -> &str {
        "channel"
    }
}
