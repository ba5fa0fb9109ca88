//! Line filters applied before delivery.
//!
//! A filter maps a line to either a (possibly rewritten) line or `None`,
//! which means "drop". Filters run in registration order and the first drop
//! ends evaluation for that line. An empty result counts as a drop.

mod keyword;
mod rate_limit;

use std::sync::Arc;

use thiserror::Error;

pub use keyword::KeywordFilter;
pub use rate_limit::RateLimiter;

/// Errors from filter construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid rate limit: {count} lines per {window_ms}ms")]
    InvalidRate { window_ms: u128, count: u32 },
}

/// A single line transform.
///
/// Implementations take `&self` because one filter instance is shared by
/// every file tailed under the same root.
pub trait Filter: Send + Sync {
    /// Return the line to forward, or `None` to drop it.
    fn apply(&self, line: String) -> Option<String>;
}

/// Adapter that turns a closure into a [`Filter`].
pub struct FilterFn<F>(pub F);

impl<F> Filter for FilterFn<F>
where
    F: Fn(String) -> Option<String> + Send + Sync,
{
    fn apply(&self, line: String) -> Option<String> {
        (self.0)(line)
    }
}

/// Ordered, short-circuiting filter pipeline.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter; it runs after every filter already in the chain.
    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn with(mut self, filter: impl Filter + 'static) -> Self {
        self.push(Arc::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run `line` through every filter in order.
    ///
    /// Returns `None` as soon as one filter drops the line; later filters
    /// are not invoked.
    pub fn apply(&self, line: String) -> Option<String> {
        let mut current = line;
        for filter in &self.filters {
            match filter.apply(current) {
                Some(next) if !next.is_empty() => current = next,
                _ => return None,
            }
        }
        if current.is_empty() {
            return None;
        }
        Some(current)
    }
}

impl FromIterator<Arc<dyn Filter>> for FilterChain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Filter>>>(iter: I) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}
