//! Exception report sinks

use parking_lot::Mutex;

/// Destination for formatted exception reports.
///
/// `surface` is the user-visible channel. `remote` receives the same report
/// in production builds only.
pub trait ExceptionSink: Send + Sync {
    /// Show a report to the user
    fn surface(&self, report: &str);

    /// Forward a report to a remote log
    fn remote(&self, _report: &str) {}
}

/// Writes reports through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ExceptionSink for TracingSink {
    fn surface(&self, report: &str) {
        tracing::error!(target: "hotfix::exception", "{}", report);
    }

    fn remote(&self, report: &str) {
        tracing::error!(target: "hotfix::remote", "{}", report);
    }
}

/// Keeps reports in memory for hosts that render them later
#[derive(Debug, Default)]
pub struct MemorySink {
    surfaced: Mutex<Vec<String>>,
    remote: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports shown so far
    pub fn surfaced(&self) -> Vec<String> {
        self.surfaced.lock().clone()
    }

    /// Reports forwarded remotely so far
    pub fn remote_reports(&self) -> Vec<String> {
        self.remote.lock().clone()
    }
}

impl ExceptionSink for MemorySink {
    fn surface(&self, report: &str) {
        self.surfaced.lock().push(report.to_string());
    }

    fn remote(&self, report: &str) {
        self.remote.lock().push(report.to_string());
    }
}
