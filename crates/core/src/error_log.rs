use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Most recent entries kept; older ones are dropped first.
pub const ERROR_LOG_CAPACITY: usize = 200;

/// Shared, append-only list of human-readable errors.
///
/// Cloning yields another handle to the same log. Every append is also
/// reported through `tracing::error!`.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    inner: Arc<Mutex<Inner>>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Inner {
    entries: VecDeque<String>,
    // Appends since creation; unaffected by rotation and `clear`.
    pushed: u64,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::with_capacity(ERROR_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity.min(64)),
                pushed: 0,
            })),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        if let Ok(mut inner) = self.inner.lock() {
            if inner.entries.len() == self.capacity {
                inner.entries.pop_front();
            }
            inner.entries.push_back(message);
            inner.pushed += 1;
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.snapshot().0
    }

    /// Entries together with the number of appends ever made, read under
    /// one lock. The count tells a reader how many entries are new even
    /// when rotation drops old ones.
    pub fn snapshot(&self) -> (Vec<String>, u64) {
        self.inner
            .lock()
            .map(|inner| (inner.entries.iter().cloned().collect(), inner.pushed))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
        }
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new()
    }
}
