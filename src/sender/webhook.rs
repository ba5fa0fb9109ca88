//! JSON webhook sender (chat robots, incident hooks).
//!
//! Lines are queued to a dedicated worker thread that owns a blocking HTTP
//! client, so `send` never waits on the network. When the queue is full the
//! line is dropped with a warning. Shutdown gives the queue a fixed grace
//! period; whatever is still queued after that is discarded.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::LineSender;
use crate::config::ConfigError;

const DEFAULT_QUEUE: usize = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Set once by `shutdown`; the worker stops posting after this instant.
type Deadline = Arc<Mutex<Option<Instant>>>;

/// Body layout expected by the receiving endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WebhookFormat {
    /// `{"text": "<line>"}`
    #[default]
    Plain,
    /// `{"msgtype": "text", "text": {"content": "<line>"}}`
    Wecom,
}

impl WebhookFormat {
    pub fn payload(self, line: &str) -> Value {
        match self {
            WebhookFormat::Plain => json!({ "text": line }),
            WebhookFormat::Wecom => json!({
                "msgtype": "text",
                "text": { "content": line },
            }),
        }
    }
}

/// Posts each line as JSON to a URL.
pub struct WebhookSender {
    url: String,
    queue: Mutex<Option<Sender<String>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    deadline: Deadline,
}

impl WebhookSender {
    pub fn new(url: impl Into<String>, format: WebhookFormat) -> Result<Self, ConfigError> {
        Self::with_queue(url, format, DEFAULT_QUEUE)
    }

    pub fn with_queue(
        url: impl Into<String>,
        format: WebhookFormat,
        capacity: usize,
    ) -> Result<Self, ConfigError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidSender {
                reason: format!("webhook url must be http(s): {url}"),
            });
        }

        let (tx, rx) = bounded::<String>(capacity.max(1));
        let target = url.clone();
        let deadline: Deadline = Arc::default();
        let worker_deadline = deadline.clone();
        let worker = thread::Builder::new()
            .name("tailwatch-webhook".to_string())
            .spawn(move || {
                let client = match reqwest::blocking::Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .build()
                {
                    Ok(client) => client,
                    Err(e) => {
                        tracing::error!("[webhook] cannot build client: {e}");
                        return;
                    }
                };

                drain_queue(rx, &worker_deadline, |line, timeout| {
                    let body = format.payload(line);
                    match client.post(&target).json(&body).timeout(timeout).send() {
                        Ok(resp) if resp.status().is_success() => {
                            crate::debug_event!("webhook", "delivered", "{}", resp.status());
                        }
                        Ok(resp) => {
                            tracing::warn!("[webhook] {} responded {}", target, resp.status());
                        }
                        Err(e) => tracing::warn!("[webhook] post to {target} failed: {e}"),
                    }
                });
            })
            .map_err(|e| ConfigError::InvalidSender {
                reason: format!("cannot start webhook worker: {e}"),
            })?;

        Ok(Self {
            url,
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            deadline,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop accepting lines and wait for queued ones to be posted.
    ///
    /// Waits at most a few seconds; lines still queued after that
    /// are discarded and counted in a warning.
    pub fn shutdown(&self) {
        self.deadline
            .lock()
            .get_or_insert_with(|| Instant::now() + SHUTDOWN_GRACE);
        drop(self.queue.lock().take());
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("[webhook] worker panicked");
            }
        }
    }
}

/// Post every queued line until the channel closes. Once a deadline is set,
/// each request is capped by the time left and lines past it are skipped.
///
/// Returns the number of lines discarded.
fn drain_queue(
    rx: Receiver<String>,
    deadline: &Mutex<Option<Instant>>,
    mut post: impl FnMut(&str, Duration),
) -> usize {
    let mut discarded = 0;
    for line in rx {
        let timeout = match *deadline.lock() {
            None => REQUEST_TIMEOUT,
            Some(at) => {
                let left = at.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    discarded += 1;
                    continue;
                }
                left.min(REQUEST_TIMEOUT)
            }
        };
        post(&line, timeout);
    }

    if discarded > 0 {
        tracing::warn!("[webhook] shutdown grace elapsed, discarded {discarded} queued lines");
    }
    discarded
}

impl LineSender for WebhookSender {
    fn send(&self, line: &str) {
        if line.is_empty() {
            return;
        }

        let queue = self.queue.lock();
        let Some(tx) = queue.as_ref() else {
            return;
        };
        match tx.try_send(line.to_string()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("[webhook] queue full, dropping line for {}", self.url);
            }
            Err(TrySendError::Disconnected(_)) => {
                crate::debug_event!("webhook", "dropped", "worker stopped");
            }
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

impl Drop for WebhookSender {
    fn drop(&mut self) {
        self.shutdown();
    }
}
