use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::broadcast::job_progress::{JobPhase, JobProgressEvent, JobProgressTracker};
use crate::job::Step;

/// Events emitted by the pipeline while a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Workspace and record are being cleared for a recreate.
    Resetting,
    Phase { step: Step, message: String },
    /// The job record was persisted after `step` completed.
    Checkpoint { step: Step, progress: u8 },
    Warning { message: String },
    Completed { final_video_url: String },
    Failed { error: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Keeps every event in order.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Bridges pipeline events to the job progress broadcast channel.
pub struct BroadcastProgress {
    tracker: JobProgressTracker,
}

impl BroadcastProgress {
    pub fn new(job_id: &str, sender: Arc<broadcast::Sender<JobProgressEvent>>) -> Self {
        Self {
            tracker: JobProgressTracker::new(job_id, sender),
        }
    }

    pub fn from_tracker(tracker: JobProgressTracker) -> Self {
        Self { tracker }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Resetting => {
                self.tracker
                    .update_phase(JobPhase::Resetting, "Clearing previous run...");
            }
            ProgressEvent::Phase { step, message } => {
                self.tracker.update_phase(step.into(), &message);
            }
            ProgressEvent::Checkpoint { step, progress } => {
                self.tracker.checkpoint(step.into(), progress);
            }
            ProgressEvent::Warning { message } => {
                self.tracker.update_phase(JobPhase::Visuals, &message);
            }
            ProgressEvent::Completed { final_video_url } => {
                self.tracker.completed(&final_video_url);
            }
            ProgressEvent::Failed { error } => {
                self.tracker.failed(&error);
            }
        }
    }
}
