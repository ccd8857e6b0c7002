//! Pipeline stages and the callback used to observe transitions.

use std::fmt;

/// States a request moves through.
///
/// `Resolving → Downloading → [Muxing] → Delivering → Cleanup → Done`, with
/// `Failed` reachable from any state before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Resolving,
    Downloading,
    Muxing,
    Delivering,
    Cleanup,
    Done,
    Failed,
}

impl PipelineStage {
    /// Whether no further transitions can follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Lowercase name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Downloading => "downloading",
            Self::Muxing => "muxing",
            Self::Delivering => "delivering",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives every stage transition of a request.
///
/// Wraps a callback that gets the request's ID and the stage just entered.
pub struct StageReporter {
    callback: Box<dyn Fn(tm_core::RequestId, PipelineStage) + Send + Sync>,
}

impl StageReporter {
    /// Create a new reporter from the given callback.
    pub fn new(callback: impl Fn(tm_core::RequestId, PipelineStage) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op reporter that discards all transitions.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report a transition.
    pub fn enter(&self, request_id: tm_core::RequestId, stage: PipelineStage) {
        tracing::info!(request_id = %request_id, stage = %stage, "pipeline stage");
        (self.callback)(request_id, stage);
    }
}

impl Default for StageReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for StageReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageReporter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn stage_display() {
        assert_eq!(PipelineStage::Resolving.to_string(), "resolving");
        assert_eq!(PipelineStage::Muxing.to_string(), "muxing");
        assert_eq!(PipelineStage::Failed.to_string(), "failed");
    }

    #[test]
    fn terminal_stages() {
        assert!(PipelineStage::Done.is_terminal());
        assert!(PipelineStage::Failed.is_terminal());
        assert!(!PipelineStage::Cleanup.is_terminal());
    }

    #[test]
    fn reporter_forwards_transitions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = StageReporter::new(move |_, stage| sink.lock().unwrap().push(stage));

        let id = tm_core::RequestId::new();
        reporter.enter(id, PipelineStage::Resolving);
        reporter.enter(id, PipelineStage::Downloading);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![PipelineStage::Resolving, PipelineStage::Downloading]
        );
    }
}
