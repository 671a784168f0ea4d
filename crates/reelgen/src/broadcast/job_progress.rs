//! Job progress broadcaster for real-time job status streaming.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::Step;

/// Phase of a video job as seen by subscribers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Resetting,
    Script,
    Speech,
    Transcript,
    Visuals,
    Stitching,
    Completed,
    Failed,
}

impl From<Step> for JobPhase {
    fn from(step: Step) -> Self {
        match step {
            Step::Script => JobPhase::Script,
            Step::Speech => JobPhase::Speech,
            Step::Transcript => JobPhase::Transcript,
            Step::Visuals => JobPhase::Visuals,
            Step::Stitching => JobPhase::Stitching,
        }
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Queued => write!(f, "Queued"),
            JobPhase::Resetting => write!(f, "Resetting"),
            JobPhase::Script => write!(f, "Writing script"),
            JobPhase::Speech => write!(f, "Synthesizing speech"),
            JobPhase::Transcript => write!(f, "Aligning transcript"),
            JobPhase::Visuals => write!(f, "Acquiring visuals"),
            JobPhase::Stitching => write!(f, "Stitching video"),
            JobPhase::Completed => write!(f, "Completed"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    pub phase: JobPhase,
    pub status: JobStatus,
    /// Last persisted progress checkpoint, 0 to 100.
    pub progress: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
    /// Set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, phase: JobPhase, progress: u8, message: &str) -> Self {
        let status = match phase {
            JobPhase::Completed => JobStatus::Completed,
            JobPhase::Failed => JobStatus::Failed,
            _ => JobStatus::Running,
        };

        Self {
            job_id: job_id.to_string(),
            phase,
            status,
            progress,
            message: message.to_string(),
            timestamp: Utc::now(),
            final_video_url: None,
            error: None,
        }
    }

    pub fn completed(job_id: &str, final_video_url: &str) -> Self {
        Self {
            final_video_url: Some(final_video_url.to_string()),
            ..Self::new(job_id, JobPhase::Completed, 100, "Video ready")
        }
    }

    pub fn failed(job_id: &str, progress: u8, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(job_id, JobPhase::Failed, progress, "Video generation failed")
        }
    }
}

/// Broadcasts job progress events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for one job and announces it as queued.
    pub fn start_job(&self, job_id: &str) -> JobProgressTracker {
        let tracker = JobProgressTracker::new(job_id, Arc::clone(&self.sender));
        tracker.update_phase(JobPhase::Queued, "Job queued for generation");
        tracker
    }

    pub fn sender(&self) -> Arc<broadcast::Sender<JobProgressEvent>> {
        Arc::clone(&self.sender)
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Tracks progress for a single job.
pub struct JobProgressTracker {
    job_id: String,
    progress: AtomicU8,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    pub fn new(job_id: &str, sender: Arc<broadcast::Sender<JobProgressEvent>>) -> Self {
        Self {
            job_id: job_id.to_string(),
            progress: AtomicU8::new(0),
            sender,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    pub fn update_phase(&self, phase: JobPhase, message: &str) {
        let event = JobProgressEvent::new(&self.job_id, phase, self.progress(), message);
        let _ = self.sender.send(event);
    }

    /// Records a persisted checkpoint and announces it under `phase`.
    pub fn checkpoint(&self, phase: JobPhase, progress: u8) {
        self.progress.store(progress, Ordering::Relaxed);
        let message = format!("{} done ({}%)", phase, progress);
        self.update_phase(phase, &message);
    }

    pub fn completed(&self, final_video_url: &str) {
        self.progress.store(100, Ordering::Relaxed);
        let _ = self
            .sender
            .send(JobProgressEvent::completed(&self.job_id, final_video_url));
    }

    pub fn failed(&self, error: &str) {
        let event = JobProgressEvent::failed(&self.job_id, self.progress(), error);
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcaster_send_receive() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        broadcaster.send(JobProgressEvent::new("job-1", JobPhase::Speech, 10, "Testing"));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.job_id, "job-1");
        assert_eq!(received.phase, JobPhase::Speech);
        assert_eq!(received.status, JobStatus::Running);
        assert_eq!(received.progress, 10);
    }

    #[test]
    fn test_start_job_and_checkpoints() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        let tracker = broadcaster.start_job("job-1");
        let received = rx.try_recv().unwrap();
        assert_eq!(received.phase, JobPhase::Queued);
        assert_eq!(received.progress, 0);

        tracker.checkpoint(JobPhase::Script, 10);
        let received = rx.try_recv().unwrap();
        assert_eq!(received.phase, JobPhase::Script);
        assert_eq!(received.progress, 10);
        assert_eq!(received.message, "Writing script done (10%)");

        tracker.update_phase(JobPhase::Speech, "Synthesizing narration...");
        let received = rx.try_recv().unwrap();
        assert_eq!(received.progress, 10);
    }

    #[test]
    fn test_job_completion() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        let tracker = broadcaster.start_job("job-2");
        let _ = rx.try_recv(); // queued

        tracker.completed("https://cdn.example/job-2.mp4");

        let received = rx.try_recv().unwrap();
        assert_eq!(received.status, JobStatus::Completed);
        assert_eq!(received.progress, 100);
        assert_eq!(
            received.final_video_url.as_deref(),
            Some("https://cdn.example/job-2.mp4")
        );
    }

    #[test]
    fn test_job_failure_keeps_last_checkpoint() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        let tracker = broadcaster.start_job("job-3");
        tracker.checkpoint(JobPhase::Speech, 30);
        tracker.failed("transcript aligner: HTTP 502: bad gateway");

        let received: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let last = received.last().unwrap();
        assert_eq!(last.status, JobStatus::Failed);
        assert_eq!(last.progress, 30);
        assert_eq!(
            last.error.as_deref(),
            Some("transcript aligner: HTTP 502: bad gateway")
        );
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = JobProgressEvent::completed("job-4", "https://cdn/x.mp4");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["jobId"], "job-4");
        assert_eq!(json["finalVideoUrl"], "https://cdn/x.mp4");
        assert_eq!(json["status"], "completed");
        assert!(json.get("error").is_none());
    }
}
