//! Non-fatal validation reporting.
//!
//! Usage mistakes in graph construction (unmatched begin/end calls, missing
//! task callbacks, foreign resource handles, ...) are recorded here instead of
//! aborting. The offending call becomes a no-op or the offending pass/resource
//! is dropped from compilation, and the caller can inspect the error count and
//! reports afterwards.

use parking_lot::Mutex;

/// Kinds of usage errors the validator recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A pass was still open when the graph build ended.
    MissingEndPass,
    /// A pass had no task callback set when the graph build ended.
    MissingPassTask,
    /// `connect_swapchain_output` was called outside an open pass.
    SwapchainOutputOutsidePass,
    /// A `begin_*_pass` call arrived while another pass was still open.
    NestedPassBegin,
    /// `end_pass` was called with no open pass.
    UnmatchedEndPass,
    /// A nested `begin_frame_graph` arrived before the previous build ended.
    NestedGraphBuild,
    /// The swapchain was imported more than once into the same graph.
    DoubleSwapchainImport,
    /// A resource handle did not belong to the current build.
    ForeignResourceHandle,
    /// A connect call arrived outside an open pass.
    ConnectOutsidePass,
    /// An imported resource was never connected to any pass.
    UnusedImportedResource,
    /// A bindless index was released that does not exist for the binding kind.
    UnknownBindlessIndex,
    /// The device was not updated before frame work began.
    MissingDeviceUpdate,
}

/// A single recorded validation report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// What went wrong.
    pub kind: ValidationErrorKind,
    /// Human-readable context (pass/resource names and the like).
    pub message: String,
}

/// Collects validation reports for a device.
///
/// Owned by the [`Device`](crate::device::Device); all graph builds on that
/// device report into the same sink.
#[derive(Debug, Default)]
pub struct ValidationSink {
    reports: Mutex<Vec<ValidationReport>>,
}

impl ValidationSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a usage error.
    pub fn report(&self, kind: ValidationErrorKind, message: impl Into<String>) {
        let message = message.into();
        log::warn!("validation: {:?}: {}", kind, message);
        self.reports.lock().push(ValidationReport { kind, message });
    }

    /// Number of validation errors recorded since the last reset.
    pub fn error_count(&self) -> usize {
        self.reports.lock().len()
    }

    /// Number of reports available for printing.
    pub fn report_count(&self) -> usize {
        self.reports.lock().len()
    }

    /// Clear all recorded reports.
    pub fn reset(&self) {
        self.reports.lock().clear();
    }

    /// Snapshot of all recorded reports.
    pub fn reports(&self) -> Vec<ValidationReport> {
        self.reports.lock().clone()
    }

    /// Check whether a report of the given kind was recorded.
    pub fn has_error(&self, kind: ValidationErrorKind) -> bool {
        self.reports.lock().iter().any(|r| r.kind == kind)
    }

    /// Print all reports through the log channel.
    pub fn print_reports(&self) {
        let reports = self.reports.lock();
        for (i, report) in reports.iter().enumerate() {
            log::warn!("report {}: {:?}: {}", i, report.kind, report.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_and_count() {
        let sink = ValidationSink::new();
        assert_eq!(sink.error_count(), 0);

        sink.report(ValidationErrorKind::MissingEndPass, "pass 'shadow'");
        sink.report(ValidationErrorKind::MissingPassTask, "pass 'blur'");

        assert_eq!(sink.error_count(), 2);
        assert_eq!(sink.report_count(), 2);
        assert!(sink.has_error(ValidationErrorKind::MissingEndPass));
        assert!(!sink.has_error(ValidationErrorKind::DoubleSwapchainImport));
    }

    #[test]
    fn test_reset() {
        let sink = ValidationSink::new();
        sink.report(ValidationErrorKind::UnmatchedEndPass, "no open pass");
        sink.reset();
        assert_eq!(sink.error_count(), 0);
        assert!(sink.reports().is_empty());
    }

    #[test]
    fn test_reports_snapshot() {
        let sink = ValidationSink::new();
        sink.report(ValidationErrorKind::ForeignResourceHandle, "handle 3");
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ValidationErrorKind::ForeignResourceHandle);
        assert_eq!(reports[0].message, "handle 3");
    }
}
