/// Per-job state machine: `Idle → Rendering(i/N) → Encoding → Complete | Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Rendering { done: usize, total: usize },
    Encoding,
    Complete,
    /// `slide` is set when a specific slide caused the failure.
    Failed { slide: Option<usize> },
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed { .. })
    }
}

/// Advisory progress callbacks. Ignoring them never changes the job's outcome.
pub trait ProgressObserver {
    fn on_state(&mut self, _state: JobState) {}
    /// Fraction in `0.0..=1.0`; non-decreasing, and `1.0` arrives once, after finalization.
    fn on_progress(&mut self, _fraction: f64) {}
}

/// Observer that keeps everything it is told.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    pub states: Vec<JobState>,
    pub progress: Vec<f64>,
}

impl ProgressObserver for RecordingObserver {
    fn on_state(&mut self, state: JobState) {
        self.states.push(state);
    }

    fn on_progress(&mut self, fraction: f64) {
        self.progress.push(fraction);
    }
}

/// Observer that reports progress through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_state(&mut self, state: JobState) {
        tracing::debug!(?state, "export state");
    }

    fn on_progress(&mut self, fraction: f64) {
        tracing::info!(percent = (fraction * 100.0).round() as u32, "export progress");
    }
}
