use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::broadcast::JobProgressBroadcaster;
use crate::error::WorkerError;
use crate::job::VideoJob;
use crate::pipeline::progress::{BroadcastProgress, NoopProgress, ProgressReporter};
use crate::pipeline::Pipeline;
use crate::worker::job::{JobRequest, JobResult};

type RunningSet = Arc<Mutex<HashSet<String>>>;

/// Runs video jobs on a fixed set of worker threads.
///
/// Each worker drives one job at a time on the shared tokio runtime, so at
/// most `worker_count` jobs run concurrently. A job id can only be queued or
/// running once.
pub struct WorkerPool {
    job_sender: Sender<JobRequest>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    cancel: CancellationToken,
    running: RunningSet,
}

impl WorkerPool {
    pub fn new(pipeline: Arc<Pipeline>, runtime: Handle, worker_count: usize) -> Self {
        Self::with_broadcaster(pipeline, runtime, worker_count, None)
    }

    /// Creates a pool that streams each job's progress through `broadcaster`.
    pub fn with_broadcaster(
        pipeline: Arc<Pipeline>,
        runtime: Handle,
        worker_count: usize,
        broadcaster: Option<JobProgressBroadcaster>,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = bounded::<JobRequest>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<JobResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let running: RunningSet = Arc::new(Mutex::new(HashSet::new()));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let worker = Worker {
                id: worker_id,
                jobs: job_receiver.clone(),
                results: result_sender.clone(),
                shutdown: Arc::clone(&shutdown),
                cancel: cancel.clone(),
                running: Arc::clone(&running),
                pipeline: Arc::clone(&pipeline),
                runtime: runtime.clone(),
                broadcaster: broadcaster.clone(),
            };
            workers.push(thread::spawn(move || worker.run()));
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
            cancel,
            running,
        }
    }

    /// Queues `job`. Blocks while the queue is full.
    pub fn submit(&self, job: VideoJob, recreate: bool) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ShuttingDown);
        }
        if !job.has_id() {
            return Err(WorkerError::MissingJobId);
        }

        let id = job.id.clone();
        if !lock(&self.running).insert(id.clone()) {
            return Err(WorkerError::AlreadyRunning(id));
        }

        self.job_sender
            .send(JobRequest { job, recreate })
            .map_err(|_| {
                lock(&self.running).remove(&id);
                WorkerError::ChannelClosed
            })
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<JobResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    /// Ids of jobs that are queued or running.
    pub fn active_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.running).iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Stops accepting jobs and cancels the ones in flight. Queued jobs still
    /// produce a (cancelled) result.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
        self.cancel.cancel();
    }

    pub fn wait(self) {
        // Workers exit once the queue is drained and the sender is gone
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

fn lock(running: &RunningSet) -> MutexGuard<'_, HashSet<String>> {
    running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Releases a job id when its run ends, including by panic.
struct RunningGuard {
    running: RunningSet,
    id: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        lock(&self.running).remove(&self.id);
    }
}

struct Worker {
    id: usize,
    jobs: Receiver<JobRequest>,
    results: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    cancel: CancellationToken,
    running: RunningSet,
    pipeline: Arc<Pipeline>,
    runtime: Handle,
    broadcaster: Option<JobProgressBroadcaster>,
}

impl Worker {
    fn run(self) {
        debug!("Worker {} started", self.id);

        loop {
            match self.jobs.recv_timeout(Duration::from_millis(100)) {
                Ok(request) => {
                    let result = self.process(request);
                    if let Err(e) = self.results.send(result) {
                        error!("Worker {} failed to send result: {}", self.id, e);
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        debug!("Worker {} received shutdown signal", self.id);
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Worker {} job channel disconnected", self.id);
                    break;
                }
            }
        }

        debug!("Worker {} stopped", self.id);
    }

    fn process(&self, request: JobRequest) -> JobResult {
        let _guard = RunningGuard {
            running: Arc::clone(&self.running),
            id: request.job.id.clone(),
        };
        debug!(
            "Worker {} running job {} (recreate: {})",
            self.id, request.job.id, request.recreate
        );

        let progress: Box<dyn ProgressReporter> = match &self.broadcaster {
            Some(broadcaster) => Box::new(BroadcastProgress::from_tracker(
                broadcaster.start_job(&request.job.id),
            )),
            None => Box::new(NoopProgress),
        };

        let (job, result) = self.runtime.block_on(self.pipeline.run_job(
            request.job,
            request.recreate,
            &self.cancel,
            progress.as_ref(),
        ));

        let result = JobResult::from_run(job, result);
        if result.success {
            info!("Job {} completed", result.job_id);
        } else {
            error!(
                "Job {} failed: {}",
                result.job_id,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::stub;
    use crate::config::Config;
    use crate::job::VideoInput;
    use crate::pipeline::PipelineConfig;
    use crate::store::{JobStore, MemoryJobStore};
    use tempfile::TempDir;
    use tokio::runtime::Runtime;

    fn create_pool(temp_dir: &TempDir, worker_count: usize) -> (Runtime, Arc<MemoryJobStore>, WorkerPool) {
        let runtime = Runtime::new().unwrap();
        let config = Config {
            workspace_root: temp_dir.path().to_string_lossy().into_owned(),
            ..Config::default()
        };
        let store = Arc::new(MemoryJobStore::new());
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(PipelineConfig::from_config(&config)),
            stub::collaborators(),
            store.clone(),
        ));
        let pool = WorkerPool::new(pipeline, runtime.handle().clone(), worker_count);
        (runtime, store, pool)
    }

    fn saved_job(runtime: &Runtime, store: &MemoryJobStore, topic: &str) -> VideoJob {
        let job = VideoJob::new("owner-1", VideoInput::new(topic, "_nas"));
        runtime.block_on(store.save(&job)).unwrap()
    }

    #[test]
    fn test_worker_pool_creation() {
        let temp_dir = TempDir::new().unwrap();
        let (_runtime, _store, pool) = create_pool(&temp_dir, 2);

        assert!(!pool.is_shutdown());

        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(pool.cancel_token().is_cancelled());

        pool.wait();
    }

    #[test]
    fn test_submit_and_run_job() {
        let temp_dir = TempDir::new().unwrap();
        let (runtime, store, pool) = create_pool(&temp_dir, 2);
        let job = saved_job(&runtime, &store, "Honeybees");

        pool.submit(job.clone(), false).unwrap();

        let result = pool.recv_result().unwrap();
        assert!(result.success, "Job failed: {:?}", result.error);
        assert_eq!(result.job_id, job.id);
        assert!(result.job.is_done());
        assert!(pool.active_jobs().is_empty());

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_results_polled_without_blocking() {
        let temp_dir = TempDir::new().unwrap();
        let (runtime, store, pool) = create_pool(&temp_dir, 1);

        assert!(pool.try_recv_result().is_none());
        assert!(pool.recv_result_timeout(Duration::from_millis(10)).is_none());

        let job = saved_job(&runtime, &store, "Glaciers");
        pool.submit(job.clone(), false).unwrap();

        let result = pool
            .recv_result_timeout(Duration::from_secs(10))
            .expect("job should finish");
        assert_eq!(result.job_id, job.id);
        assert!(result.success, "Job failed: {:?}", result.error);
        assert!(pool.try_recv_result().is_none());

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_submit_rejects_unsaved_job() {
        let temp_dir = TempDir::new().unwrap();
        let (_runtime, _store, pool) = create_pool(&temp_dir, 1);
        let job = VideoJob::new("owner-1", VideoInput::new("Owls", "_nas"));

        assert!(matches!(
            pool.submit(job, false),
            Err(WorkerError::MissingJobId)
        ));

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_duplicate_submission_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let (runtime, store, pool) = create_pool(&temp_dir, 1);
        let job = saved_job(&runtime, &store, "Comets");

        // Hold the id as if a run were in flight
        lock(&pool.running).insert(job.id.clone());

        match pool.submit(job.clone(), true) {
            Err(WorkerError::AlreadyRunning(id)) => assert_eq!(id, job.id),
            other => panic!("unexpected: {:?}", other),
        }

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let temp_dir = TempDir::new().unwrap();
        let (runtime, store, pool) = create_pool(&temp_dir, 1);
        let job = saved_job(&runtime, &store, "Deserts");

        pool.shutdown();
        assert!(matches!(
            pool.submit(job, false),
            Err(WorkerError::ShuttingDown)
        ));
        pool.wait();
    }
}
