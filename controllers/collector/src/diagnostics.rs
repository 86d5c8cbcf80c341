//! Diagnostic sink for soft validation problems.
//!
//! A diagnostic is never an error: reconciliation continues after it is emitted.

use tracing::warn;

/// Receives non-fatal warnings about an instance.
pub trait DiagnosticSink: Send + Sync {
    /// Report a warning about the instance `namespace/name`
    fn warning(&self, namespace: &str, name: &str, message: &str);
}

/// Emits diagnostics as `tracing` warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warning(&self, namespace: &str, name: &str, message: &str) {
        warn!(namespace = %namespace, name = %name, "{}", message);
    }
}

/// Collects diagnostics in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    warnings: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingSink {
    /// Warnings recorded so far, formatted as `namespace/name: message`
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
impl DiagnosticSink for RecordingSink {
    fn warning(&self, namespace: &str, name: &str, message: &str) {
        self.warnings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(format!("{}/{}: {}", namespace, name, message));
    }
}
