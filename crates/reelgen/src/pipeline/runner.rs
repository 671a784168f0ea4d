use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::collaborators::{service, with_timeout, CollaboratorError, Collaborators, PromptContext};
use crate::fanout::{FanoutError, SegmentFanout};
use crate::job::{checkpoint, MediaType, StockClip, Step, Transcript, VideoJob, VisualSource};
use crate::storage::WorkspaceRoot;
use crate::store::JobStore;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, PipelineWarning};
use super::progress::{ProgressEvent, ProgressReporter};
use super::stock::select_covering;

/// What a successful run produced besides the job record.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub visuals: VisualSource,
    pub clips: Vec<StockClip>,
    pub images: Vec<PathBuf>,
    pub warnings: Vec<PipelineWarning>,
}

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    collaborators: Collaborators,
    store: Arc<dyn JobStore>,
    workspaces: WorkspaceRoot,
    fanout: SegmentFanout,
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        collaborators: Collaborators,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let workspaces = WorkspaceRoot::new(&config.workspace_root);
        let fanout = SegmentFanout::new(
            Arc::clone(&collaborators.prompts),
            Arc::clone(&collaborators.images),
            config.fanout.clone(),
        );

        Self {
            config,
            collaborators,
            store,
            workspaces,
            fanout,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Runs every stage for `job`, persisting the record after each one.
    ///
    /// Without `recreate` the job must not have run before. With it, the
    /// record and workspace are cleared and persisted before the first stage.
    /// The returned record is the last persisted state; on failure its error
    /// holds the same message as the returned error, except for rejected
    /// input, which leaves the record untouched.
    pub async fn run_job(
        &self,
        job: VideoJob,
        recreate: bool,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> (VideoJob, Result<RunSummary, PipelineError>) {
        let span = info_span!("pipeline",
            job_id = %job.id,
            media_type = job.input.media_type.as_str(),
            recreate,
        );
        self.run_job_inner(job, recreate, cancel, progress)
            .instrument(span)
            .await
    }

    async fn run_job_inner(
        &self,
        mut job: VideoJob,
        recreate: bool,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> (VideoJob, Result<RunSummary, PipelineError>) {
        if let Err(e) = self.admit(&job, recreate) {
            warn!("Job rejected: {}", e);
            return (job, Err(e));
        }

        if !job.has_id() {
            match self.store.save(&job).await {
                Ok(saved) => job = saved,
                Err(e) => return (job, Err(e.into())),
            }
        }

        let workspace = match self.workspaces.for_job(&job.id) {
            Ok(workspace) => workspace,
            Err(e) => {
                let e = PipelineError::from(e);
                let job = self.record_failure(job, &e, progress).await;
                return (job, Err(e));
            }
        };

        let mut ctx = PipelineContext::new(job, workspace);
        match self.run_stages(&mut ctx, recreate, cancel, progress).await {
            Ok(visuals) => {
                let final_video_url = ctx.job.artifacts.final_video_url.clone().unwrap_or_default();
                info!(url = %final_video_url, "Video job completed");
                progress.report(ProgressEvent::Completed { final_video_url });
                let summary = RunSummary {
                    visuals,
                    clips: std::mem::take(&mut ctx.clips),
                    images: std::mem::take(&mut ctx.images),
                    warnings: std::mem::take(&mut ctx.warnings),
                };
                (ctx.job, Ok(summary))
            }
            Err(e) => {
                let job = self.record_failure(ctx.job, &e, progress).await;
                (job, Err(e))
            }
        }
    }

    /// Rejections that happen before anything is written.
    fn admit(&self, job: &VideoJob, recreate: bool) -> Result<(), PipelineError> {
        job.input.validate(&self.config.music_tracks)?;
        if !recreate && !job.is_fresh() {
            return Err(PipelineError::NotFresh {
                id: job.id.clone(),
                stage: job.stage(),
            });
        }
        Ok(())
    }

    async fn run_stages(
        &self,
        ctx: &mut PipelineContext,
        recreate: bool,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<VisualSource, PipelineError> {
        if recreate {
            progress.report(ProgressEvent::Resetting);
            self.step_reset(ctx).instrument(info_span!("reset")).await?;
        } else {
            ctx.workspace.ensure().await?;
        }

        // Step 1: Script
        self.enter(Step::Script, "Writing script...", cancel, progress)?;
        self.step_script(ctx)
            .instrument(info_span!("script"))
            .await?;
        self.checkpoint(ctx, Step::Script, progress).await?;

        // Step 2: Speech
        self.enter(Step::Speech, "Synthesizing narration...", cancel, progress)?;
        self.step_speech(ctx)
            .instrument(info_span!("speech"))
            .await?;
        self.checkpoint(ctx, Step::Speech, progress).await?;

        // Step 3: Transcript
        self.enter(Step::Transcript, "Aligning transcript...", cancel, progress)?;
        self.step_transcript(ctx)
            .instrument(info_span!("transcript"))
            .await?;
        self.checkpoint(ctx, Step::Transcript, progress).await?;

        // Step 4: Visuals
        self.enter(Step::Visuals, "Acquiring visuals...", cancel, progress)?;
        let visuals = self
            .step_visuals(ctx, cancel, progress)
            .instrument(info_span!("visuals"))
            .await?;
        self.checkpoint(ctx, Step::Visuals, progress).await?;

        // Step 5: Stitching
        self.enter(Step::Stitching, "Stitching video...", cancel, progress)?;
        self.step_stitch(ctx)
            .instrument(info_span!("stitching"))
            .await?;
        self.checkpoint(ctx, Step::Stitching, progress).await?;

        Ok(visuals)
    }

    fn enter(
        &self,
        step: Step,
        message: &str,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            info!(step = step.as_str(), "Cancellation requested, stopping");
            return Err(PipelineError::Cancelled);
        }
        progress.report(ProgressEvent::Phase {
            step,
            message: message.to_string(),
        });
        Ok(())
    }

    async fn checkpoint(
        &self,
        ctx: &mut PipelineContext,
        step: Step,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        ctx.job = self.store.save(&ctx.job).await?;
        debug!(step = step.as_str(), progress = ctx.job.progress(), "Checkpoint persisted");
        progress.report(ProgressEvent::Checkpoint {
            step,
            progress: ctx.job.progress(),
        });
        Ok(())
    }

    async fn step_reset(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        ctx.job.reset();
        ctx.workspace.reset().await?;
        ctx.job = self.store.save(&ctx.job).await?;
        info!("Previous run cleared");
        Ok(())
    }

    async fn step_script(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let input = &ctx.job.input;
        let draft = with_timeout(
            service::SCRIPT,
            self.config.call_timeout,
            self.collaborators
                .script
                .write(&input.topic, &input.description),
        )
        .await?;

        if draft.script.trim().is_empty() {
            return Err(CollaboratorError::invalid(service::SCRIPT, "script is empty").into());
        }
        debug!(chars = draft.script.len(), essence = %draft.essence, "Script written");

        ctx.job.cleaned_topic = if draft.cleaned_topic.trim().is_empty() {
            ctx.job.input.topic.trim().to_string()
        } else {
            draft.cleaned_topic
        };
        ctx.job.script = draft.script;
        ctx.job.essence = draft.essence;
        ctx.job.complete(Step::Script, checkpoint::SCRIPT)?;
        Ok(())
    }

    async fn step_speech(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let audio = with_timeout(
            service::SPEECH,
            self.config.call_timeout,
            self.collaborators
                .speech
                .synthesize(&ctx.job.script, ctx.job.input.narrator),
        )
        .await?;

        if audio.is_empty() {
            return Err(CollaboratorError::invalid(service::SPEECH, "audio is empty").into());
        }

        let path = ctx.workspace.write_audio(&audio).await?;
        debug!(bytes = audio.len(), path = %path.display(), "Narration written");

        ctx.job.artifacts.tts_url = Some(path.display().to_string());
        ctx.job.complete(Step::Speech, checkpoint::SPEECH)?;
        ctx.audio = Some(audio);
        Ok(())
    }

    async fn step_transcript(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let audio = ctx
            .audio
            .as_deref()
            .ok_or(PipelineError::MissingArtifact("narration audio"))?;
        let sentences = with_timeout(
            service::ALIGNER,
            self.config.call_timeout,
            self.collaborators.aligner.align(audio, &ctx.job.script),
        )
        .await?;

        if sentences.is_empty() {
            return Err(
                CollaboratorError::invalid(service::ALIGNER, "transcript has no sentences").into(),
            );
        }

        let transcript = Transcript::new(sentences);
        let path = ctx.workspace.write_transcript(&transcript).await?;
        debug!(
            segments = transcript.sentences.len(),
            span_ms = transcript.span_ms(),
            "Transcript written"
        );

        ctx.job.artifacts.transcript_url = Some(path.display().to_string());
        ctx.job.complete(Step::Transcript, checkpoint::TRANSCRIPT)?;
        ctx.transcript = Some(transcript);
        Ok(())
    }

    async fn step_visuals(
        &self,
        ctx: &mut PipelineContext,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<VisualSource, PipelineError> {
        let transcript = ctx
            .transcript
            .as_ref()
            .ok_or(PipelineError::MissingArtifact("transcript"))?;

        if ctx.job.input.media_type == MediaType::Stock {
            let query = if ctx.job.essence.trim().is_empty() {
                ctx.job.cleaned_topic.as_str()
            } else {
                ctx.job.essence.as_str()
            };
            match self.match_stock(query, transcript).await {
                Ok(clips) => {
                    ctx.workspace.write_stock_clips(&clips).await?;
                    info!(clips = clips.len(), "Stock footage selected");
                    ctx.job.complete_visuals(VisualSource::Stock)?;
                    ctx.clips = clips;
                    return Ok(VisualSource::Stock);
                }
                Err(reason) => {
                    let warning = PipelineWarning::StockFallback { reason };
                    warn!("{}, generating images instead", warning);
                    progress.report(ProgressEvent::Warning {
                        message: warning.to_string(),
                    });
                    ctx.warnings.push(warning);
                }
            }
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
        }

        let context = PromptContext {
            topic: if ctx.job.cleaned_topic.is_empty() {
                ctx.job.input.topic.clone()
            } else {
                ctx.job.cleaned_topic.clone()
            },
            description: ctx.job.input.description.clone(),
            essence: ctx.job.essence.clone(),
            style: ctx.job.input.visual_style,
        };
        let report = self
            .fanout
            .generate_segment_images(&ctx.workspace, context, transcript, cancel)
            .await
            .map_err(|e| match e {
                FanoutError::Cancelled => PipelineError::Cancelled,
                other => PipelineError::Fanout(other),
            })?;

        ctx.job.complete_visuals(VisualSource::Ai)?;
        ctx.images = report.images;
        Ok(VisualSource::Ai)
    }

    /// Stock clips covering the narration, or why they cannot be used.
    async fn match_stock(
        &self,
        query: &str,
        transcript: &Transcript,
    ) -> Result<Vec<StockClip>, String> {
        let candidates = with_timeout(
            service::STOCK,
            self.config.call_timeout,
            self.collaborators
                .stock
                .find_clips(query, transcript.sentences.len()),
        )
        .await
        .map_err(|e| e.to_string())?;

        let selection = select_covering(&candidates, transcript.span_ms());
        if selection.clips.is_empty() {
            return Err(format!(
                "none of the {} candidate clips has a usable duration",
                candidates.len()
            ));
        }
        if self.config.require_full_stock_coverage && !selection.is_covering() {
            return Err(format!(
                "clips cover {:.1}s of {:.1}s narration",
                selection.covered_ms / 1000.0,
                selection.needed_ms / 1000.0
            ));
        }
        Ok(selection.clips)
    }

    async fn step_stitch(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let url = with_timeout(
            service::STITCHER,
            self.config.call_timeout,
            self.collaborators
                .stitcher
                .stitch(&ctx.job.id, &ctx.job.input.background_music),
        )
        .await?;

        ctx.job.artifacts.final_video_url = Some(url);
        ctx.job.complete(Step::Stitching, checkpoint::STITCHED)?;
        Ok(())
    }

    /// Writes `error` into the record and persists it.
    async fn record_failure(
        &self,
        mut job: VideoJob,
        error: &PipelineError,
        progress: &dyn ProgressReporter,
    ) -> VideoJob {
        let message = error.to_string();
        error!(stage = %job.stage(), "Video job failed: {}", message);
        job.fail(message.clone());
        progress.report(ProgressEvent::Failed { error: message });

        match self.store.save(&job).await {
            Ok(saved) => saved,
            Err(e) => {
                error!("Failed to persist job failure: {}", e);
                job
            }
        }
    }
}
