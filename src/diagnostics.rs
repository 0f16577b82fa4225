//! Serialized diagnostic stream for evaluation warnings.
//!
//! Workers evaluating blocks concurrently report per-point problems here.
//! Every warning is forwarded to `tracing` and appended to a shared buffer
//! as one atomic operation, so lines from different workers never interleave.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// A thread-safe buffer of warning lines.
#[derive(Debug)]
pub struct DiagnosticLog {
    lines: Mutex<Vec<String>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        // A panicking writer cannot leave a half-written line behind.
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit a warning line.
    pub fn warn(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::warn!("{}", line);
        self.lock().push(line);
    }

    /// All warning lines collected so far.
    pub fn lines(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Number of warning lines collected so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return the collected lines.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}
