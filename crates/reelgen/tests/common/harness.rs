//! Test harness for isolated pipeline runs.
//!
//! `TestHarness` owns a temporary workspace root, an in-memory job store that
//! records every snapshot, and a `Pipeline` wired to `ScriptedServices`.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use reelgen::collaborators::stub::StubServices;
use reelgen::collaborators::{
    service, CollaboratorError, Collaborators, ImageGenerator, ImagePromptGenerator,
    PromptContext, ScriptDraft, ScriptGenerator, SpeechSynthesizer, StockFootageMatcher,
    TranscriptAligner, VideoStitcher,
};
use reelgen::job::{Narrator, Segment, StockClip, VideoJob, VisualStyle};
use reelgen::pipeline::{NoopProgress, Pipeline, PipelineError, ProgressReporter, RunSummary};
use reelgen::store::MemoryJobStore;

use super::builders::PipelineConfigBuilder;

/// A collaborator call as seen by `ScriptedServices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Script,
    Speech,
    Align,
    Stock { query: String },
    Prompt {
        text: String,
        closing: String,
        context: PromptContext,
    },
    Image { prompt: String, style: VisualStyle },
    Stitch,
}

/// Collaborators that behave like the stubs unless told otherwise.
///
/// Prompts are `"prompt: <segment text>"`, so image failures are keyed by
/// segment text too.
#[derive(Default)]
pub struct ScriptedServices {
    draft: Option<ScriptDraft>,
    sentences: Option<Vec<Segment>>,
    clips: Option<Result<Vec<StockClip>, String>>,
    speech_error: Option<String>,
    prompt_failures: Mutex<HashMap<String, usize>>,
    broken_images: HashSet<String>,
    prompt_delay: Duration,
    image_delay: Duration,
    stitch_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    // Segments between their first prompt call and their last render
    active_segments: Mutex<HashSet<String>>,
    max_active_segments: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script writer returns this topic and essence around the stub script.
    pub fn with_script(mut self, cleaned_topic: &str, essence: &str) -> Self {
        self.draft = Some(ScriptDraft {
            cleaned_topic: cleaned_topic.to_string(),
            script: format!("Let's talk about {}. Thanks for watching.", cleaned_topic),
            essence: essence.to_string(),
        });
        self
    }

    /// Aligner returns exactly these sentences.
    pub fn with_sentences(mut self, sentences: Vec<Segment>) -> Self {
        self.sentences = Some(sentences);
        self
    }

    pub fn with_clips(mut self, clips: Vec<StockClip>) -> Self {
        self.clips = Some(Ok(clips));
        self
    }

    pub fn with_stock_error(mut self, message: &str) -> Self {
        self.clips = Some(Err(message.to_string()));
        self
    }

    pub fn with_speech_error(mut self, message: &str) -> Self {
        self.speech_error = Some(message.to_string());
        self
    }

    /// The prompt for `text` fails `times` times, then succeeds.
    pub fn failing_prompt(self, text: &str, times: usize) -> Self {
        if let Ok(mut failures) = self.prompt_failures.lock() {
            failures.insert(text.to_string(), times);
        }
        self
    }

    /// Rendering the image for `text` always fails.
    pub fn broken_image(mut self, text: &str) -> Self {
        self.broken_images.insert(text.to_string());
        self
    }

    pub fn with_prompt_delay(mut self, delay: Duration) -> Self {
        self.prompt_delay = delay;
        self
    }

    pub fn with_image_delay(mut self, delay: Duration) -> Self {
        self.image_delay = delay;
        self
    }

    pub fn with_stitch_delay(mut self, delay: Duration) -> Self {
        self.stitch_delay = delay;
        self
    }

    pub fn collaborators(services: &Arc<Self>) -> Collaborators {
        Collaborators {
            script: services.clone(),
            speech: services.clone(),
            aligner: services.clone(),
            stock: services.clone(),
            prompts: services.clone(),
            images: services.clone(),
            stitcher: services.clone(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    /// Highest number of image renders observed at the same time.
    pub fn max_concurrent_images(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of segments observed between prompt and finished image.
    /// Segments whose prompt never succeeds stay counted.
    pub fn max_concurrent_segments(&self) -> usize {
        self.max_active_segments.load(Ordering::SeqCst)
    }

    fn segment_started(&self, text: &str) {
        let mut active = self.active_segments.lock().unwrap();
        active.insert(text.to_string());
        self.max_active_segments
            .fetch_max(active.len(), Ordering::SeqCst);
    }

    fn segment_finished(&self, text: &str) {
        self.active_segments.lock().unwrap().remove(text);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ScriptGenerator for ScriptedServices {
    async fn write(&self, topic: &str, description: &str) -> Result<ScriptDraft, CollaboratorError> {
        self.record(Call::Script);
        match &self.draft {
            Some(draft) => Ok(draft.clone()),
            None => StubServices.write(topic, description).await,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedServices {
    async fn synthesize(
        &self,
        script: &str,
        narrator: Narrator,
    ) -> Result<Vec<u8>, CollaboratorError> {
        self.record(Call::Speech);
        match &self.speech_error {
            Some(message) => Err(CollaboratorError::failed(service::SPEECH, message.clone())),
            None => StubServices.synthesize(script, narrator).await,
        }
    }
}

#[async_trait]
impl TranscriptAligner for ScriptedServices {
    async fn align(&self, audio: &[u8], script: &str) -> Result<Vec<Segment>, CollaboratorError> {
        self.record(Call::Align);
        match &self.sentences {
            Some(sentences) => Ok(sentences.clone()),
            None => StubServices.align(audio, script).await,
        }
    }
}

#[async_trait]
impl StockFootageMatcher for ScriptedServices {
    async fn find_clips(
        &self,
        essence: &str,
        segment_count: usize,
    ) -> Result<Vec<StockClip>, CollaboratorError> {
        self.record(Call::Stock {
            query: essence.to_string(),
        });
        match &self.clips {
            Some(Ok(clips)) => Ok(clips.clone()),
            Some(Err(message)) => Err(CollaboratorError::failed(service::STOCK, message.clone())),
            None => StubServices.find_clips(essence, segment_count).await,
        }
    }
}

#[async_trait]
impl ImagePromptGenerator for ScriptedServices {
    async fn prompt_for(
        &self,
        segment_text: &str,
        context: &PromptContext,
        closing_text: &str,
    ) -> Result<String, CollaboratorError> {
        self.record(Call::Prompt {
            text: segment_text.to_string(),
            closing: closing_text.to_string(),
            context: context.clone(),
        });
        self.segment_started(segment_text);
        if !self.prompt_delay.is_zero() {
            tokio::time::sleep(self.prompt_delay).await;
        }
        {
            let mut failures = self.prompt_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(segment_text) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(CollaboratorError::failed(service::PROMPTS, "rate limited"));
                }
            }
        }
        Ok(format!("prompt: {}", segment_text))
    }
}

#[async_trait]
impl ImageGenerator for ScriptedServices {
    async fn render(&self, prompt: &str, style: VisualStyle) -> Result<Vec<u8>, CollaboratorError> {
        self.record(Call::Image {
            prompt: prompt.to_string(),
            style,
        });
        let text = prompt.strip_prefix("prompt: ").unwrap_or(prompt);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.image_delay.is_zero() {
            tokio::time::sleep(self.image_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.segment_finished(text);

        if self.broken_images.contains(text) {
            return Err(CollaboratorError::failed(service::IMAGES, "HTTP 500"));
        }
        StubServices.render(prompt, style).await
    }
}

#[async_trait]
impl VideoStitcher for ScriptedServices {
    async fn stitch(
        &self,
        job_id: &str,
        background_music: &str,
    ) -> Result<String, CollaboratorError> {
        self.record(Call::Stitch);
        if !self.stitch_delay.is_zero() {
            tokio::time::sleep(self.stitch_delay).await;
        }
        StubServices.stitch(job_id, background_music).await
    }
}

/// Isolated environment for running jobs through the pipeline.
pub struct TestHarness {
    temp_dir: TempDir,
    pub store: Arc<MemoryJobStore>,
    pub services: Arc<ScriptedServices>,
    pub pipeline: Pipeline,
}

impl TestHarness {
    pub fn new(services: ScriptedServices) -> Self {
        Self::with_config(services, |builder| builder)
    }

    pub fn with_config(
        services: ScriptedServices,
        configure: impl FnOnce(PipelineConfigBuilder) -> PipelineConfigBuilder,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = configure(PipelineConfigBuilder::new(temp_dir.path())).build();
        let services = Arc::new(services);
        let store = Arc::new(MemoryJobStore::new());
        let pipeline = Pipeline::new(
            Arc::new(config),
            ScriptedServices::collaborators(&services),
            store.clone(),
        );

        Self {
            temp_dir,
            store,
            services,
            pipeline,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn workspace(&self, job_id: &str) -> PathBuf {
        self.root().join(job_id)
    }

    /// 1-based, as written by the fan-out.
    pub fn image_path(&self, job_id: &str, n: usize) -> PathBuf {
        self.workspace(job_id)
            .join("images")
            .join(format!("image_{}.png", n))
    }

    pub async fn run(&self, job: VideoJob) -> (VideoJob, Result<RunSummary, PipelineError>) {
        self.run_with(job, false, &CancellationToken::new(), &NoopProgress)
            .await
    }

    pub async fn run_with(
        &self,
        job: VideoJob,
        recreate: bool,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> (VideoJob, Result<RunSummary, PipelineError>) {
        self.pipeline.run_job(job, recreate, cancel, progress).await
    }

    pub fn progress_history(&self, job_id: &str) -> Vec<u8> {
        self.store
            .snapshots_for(job_id)
            .iter()
            .map(VideoJob::progress)
            .collect()
    }
}
