//! Stage-observer trait for the Convert and Export flows.
//!
//! Both flows are linear pipelines:
//!
//! ```text
//! Convert: Start ─▶ Extracted ─▶ Transformed ─▶ Persisted ─▶ Done
//! Export:  Start ─▶ Read      ─▶ Transformed ─▶ Sent      ─▶ Done
//!             └──────────── any state ──────────▶ Failed(kind)
//! ```
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::BridgeConfigBuilder::observer`] to be told about each
//! transition. There is no retry transition and no partial-success state; a
//! flow either reaches [`Stage::Done`] or reports exactly one failure.
//!
//! # Example
//!
//! ```rust
//! use pdf2tally::{BridgeConfig, Flow, PipelineObserver, Stage};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl PipelineObserver for Log {
//!     fn on_stage(&self, flow: Flow, stage: Stage) {
//!         eprintln!("{flow:?} → {stage:?}");
//!     }
//! }
//!
//! let config = BridgeConfig::builder()
//!     .observer(Arc::new(Log))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The two externally triggered pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flow {
    /// PDF upload → rows → artifact.
    Convert,
    /// Artifact → records → XML → accounting endpoint.
    Export,
}

/// A state reached by a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Start,
    /// Convert: rows extracted from the PDF.
    Extracted,
    /// Export: records read back from the artifact.
    Read,
    /// Convert: workbook built. Export: XML document built.
    Transformed,
    /// Convert: artifact atomically replaced.
    Persisted,
    /// Export: endpoint accepted the document.
    Sent,
    Done,
}

/// Called by the flows on every state transition.
///
/// Implementations must be `Send + Sync`; concurrent invocations of the
/// flows may share one observer. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    /// Called when `flow` enters `stage`.
    fn on_stage(&self, flow: Flow, stage: Stage) {
        let _ = (flow, stage);
    }

    /// Called once when `flow` leaves through its failure exit.
    fn on_failed(&self, flow: Flow, kind: ErrorKind, message: &str) {
        let _ = (flow, kind, message);
    }
}

/// Observer used when none is configured.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Type stored in [`crate::config::BridgeConfig`].
pub type Observer = Arc<dyn PipelineObserver>;

/// Reports transitions for one flow invocation to an optional observer.
pub(crate) struct StageReporter<'a> {
    flow: Flow,
    observer: Option<&'a Observer>,
}

impl<'a> StageReporter<'a> {
    pub(crate) fn new(flow: Flow, observer: Option<&'a Observer>) -> Self {
        let reporter = Self { flow, observer };
        reporter.stage(Stage::Start);
        reporter
    }

    pub(crate) fn stage(&self, stage: Stage) {
        if let Some(cb) = self.observer {
            cb.on_stage(self.flow, stage);
        }
    }

    /// Pass a flow result through, reporting `Done` or the failure.
    pub(crate) fn finish<T>(&self, result: crate::Result<T>) -> crate::Result<T> {
        match &result {
            Ok(_) => self.stage(Stage::Done),
            Err(e) => {
                if let Some(cb) = self.observer {
                    cb.on_failed(self.flow, e.kind(), &e.to_string());
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pdf2TallyError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<(Flow, Stage)>>,
        failures: Mutex<Vec<(Flow, ErrorKind)>>,
    }

    impl PipelineObserver for Recorder {
        fn on_stage(&self, flow: Flow, stage: Stage) {
            self.stages.lock().unwrap().push((flow, stage));
        }

        fn on_failed(&self, flow: Flow, kind: ErrorKind, _message: &str) {
            self.failures.lock().unwrap().push((flow, kind));
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let cb = NoopObserver;
        cb.on_stage(Flow::Convert, Stage::Start);
        cb.on_failed(Flow::Export, ErrorKind::NotFound, "missing");
    }

    #[test]
    fn reporter_emits_start_and_done() {
        let rec = Arc::new(Recorder::default());
        let observer: Observer = rec.clone();
        let reporter = StageReporter::new(Flow::Export, Some(&observer));
        reporter.stage(Stage::Read);
        let out = reporter.finish(Ok(7));
        assert_eq!(out.unwrap(), 7);

        assert_eq!(
            *rec.stages.lock().unwrap(),
            vec![
                (Flow::Export, Stage::Start),
                (Flow::Export, Stage::Read),
                (Flow::Export, Stage::Done),
            ]
        );
        assert!(rec.failures.lock().unwrap().is_empty());
    }

    #[test]
    fn reporter_emits_single_failure() {
        let rec = Arc::new(Recorder::default());
        let observer: Observer = rec.clone();
        let reporter = StageReporter::new(Flow::Convert, Some(&observer));
        let out: crate::Result<()> = reporter.finish(Err(Pdf2TallyError::WrongPassword));
        assert!(out.is_err());

        let stages = rec.stages.lock().unwrap();
        assert_eq!(stages.last(), Some(&(Flow::Convert, Stage::Start)));
        assert_eq!(
            *rec.failures.lock().unwrap(),
            vec![(Flow::Convert, ErrorKind::Extraction)]
        );
    }
}
