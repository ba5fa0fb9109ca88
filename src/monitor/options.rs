//! Per-root configuration for [`Monitor::observe`](super::Monitor::observe).

use std::path::Path;
use std::sync::Arc;

use crate::filter::{Filter, FilterChain};
use crate::sender::{LineSender, SharedSender};
use crate::watcher::{Event, HandlerError};

use super::error::MonitorError;

/// Runs before any file I/O for an event; an error rejects the event.
pub type Intercept = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

/// Senders, filters and intercepts bound to one observed root.
///
/// At least one sender is required. Filters and intercepts run in the order
/// they were added.
#[derive(Clone, Default)]
pub struct ObserveOptions {
    senders: Vec<SharedSender>,
    filters: FilterChain,
    intercepts: Vec<Intercept>,
}

impl ObserveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(mut self, sender: impl LineSender + 'static) -> Self {
        self.senders.push(Arc::new(sender));
        self
    }

    pub fn shared_sender(mut self, sender: SharedSender) -> Self {
        self.senders.push(sender);
        self
    }

    pub fn senders(mut self, senders: impl IntoIterator<Item = SharedSender>) -> Self {
        self.senders.extend(senders);
        self
    }

    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn shared_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn intercept<F>(mut self, intercept: F) -> Self
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.intercepts.push(Arc::new(intercept));
        self
    }

    pub fn sender_list(&self) -> &[SharedSender] {
        &self.senders
    }

    pub fn filter_chain(&self) -> &FilterChain {
        &self.filters
    }

    pub(crate) fn run_intercepts(&self, event: &Event) -> Result<(), MonitorError> {
        for intercept in &self.intercepts {
            intercept(event).map_err(|source| MonitorError::Intercepted {
                path: event.path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub(crate) fn validate(&self, path: &Path) -> Result<(), MonitorError> {
        if self.senders.is_empty() {
            return Err(MonitorError::NoSenders {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObserveOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.senders.iter().map(|s| s.name()).collect();
        f.debug_struct("ObserveOptions")
            .field("senders", &names)
            .field("filters", &self.filters.len())
            .field("intercepts", &self.intercepts.len())
            .finish()
    }
}
