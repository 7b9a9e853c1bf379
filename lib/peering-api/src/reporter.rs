//! Progress reporting for user-facing status messages
//!
//! Reporters only observe; they never influence how an operation proceeds.

use std::error::Error;
use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

/// Sink for started/succeeded/failed notifications
pub trait Reporter: Send + Sync {
    fn started(&self, message: &str);
    fn succeeded(&self, message: &str);
    fn failed(&self, error: &dyn Error);
    fn warning(&self, message: &str);
}

/// Reporter forwarding every notification to `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for LoggingReporter {
    fn started(&self, message: &str) {
        info!("{}...", message);
    }

    fn succeeded(&self, message: &str) {
        info!("{}", message);
    }

    fn failed(&self, error: &dyn Error) {
        error!("Failed: {}", error);
    }

    fn warning(&self, message: &str) {
        warn!("{}", message);
    }
}

/// Reporter that discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn started(&self, _message: &str) {}
    fn succeeded(&self, _message: &str) {}
    fn failed(&self, _error: &dyn Error) {}
    fn warning(&self, _message: &str) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportEvent {
    Started(String),
    Succeeded(String),
    Failed(String),
    Warning(String),
}

/// Reporter keeping every notification in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReportEvent::Failed(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ReportEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Reporter for RecordingReporter {
    fn started(&self, message: &str) {
        self.push(ReportEvent::Started(message.to_string()));
    }

    fn succeeded(&self, message: &str) {
        self.push(ReportEvent::Succeeded(message.to_string()));
    }

    fn failed(&self, error: &dyn Error) {
        self.push(ReportEvent::Failed(error.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(ReportEvent::Warning(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct TestError;

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl Error for TestError {}

    #[test]
    fn test_recording_reporter_keeps_order() {
        let reporter = RecordingReporter::new();
        reporter.started("Requesting VPC peering");
        reporter.warning("slow");
        reporter.failed(&TestError);

        assert_eq!(
            reporter.events(),
            vec![
                ReportEvent::Started("Requesting VPC peering".to_string()),
                ReportEvent::Warning("slow".to_string()),
                ReportEvent::Failed("boom".to_string()),
            ]
        );
        assert_eq!(reporter.failures(), vec!["boom".to_string()]);
    }
}
