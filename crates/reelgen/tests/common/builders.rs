//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use reelgen::fanout::{FanoutSettings, RetrySchedule};
use reelgen::job::{
    MediaType, Narrator, Segment, StockClip, VideoInput, VideoJob, VisualStyle,
    DEFAULT_MUSIC_TRACKS,
};
use reelgen::pipeline::PipelineConfig;

/// Builder for `VideoInput`, starting from a valid AI-visuals request.
pub struct InputBuilder {
    input: VideoInput,
}

impl InputBuilder {
    pub fn new(topic: &str) -> Self {
        let mut input = VideoInput::new(topic, "_nas");
        input.description = format!("A short explainer about {}", topic.to_lowercase());
        Self { input }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.input.description = description.to_string();
        self
    }

    pub fn media_type(mut self, media_type: MediaType) -> Self {
        self.input.media_type = media_type;
        self
    }

    pub fn stock(self) -> Self {
        self.media_type(MediaType::Stock)
    }

    pub fn narrator(mut self, narrator: Narrator) -> Self {
        self.input.narrator = narrator;
        self
    }

    pub fn style(mut self, style: VisualStyle) -> Self {
        self.input.visual_style = style;
        self
    }

    pub fn music(mut self, track: &str) -> Self {
        self.input.background_music = track.to_string();
        self
    }

    pub fn build(self) -> VideoInput {
        self.input
    }

    pub fn job(self, owner: &str) -> VideoJob {
        VideoJob::new(owner, self.input)
    }
}

/// Sentences laid end to end, `ms_each` long, with the leading space
/// aligners put in front of every sentence.
pub fn sentences(texts: &[&str], ms_each: f64) -> Vec<Segment> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let start = i as f64 * ms_each;
            Segment::new(start, start + ms_each, format!(" {}", text))
        })
        .collect()
}

pub fn clip(id: &str, duration_secs: f64) -> StockClip {
    StockClip {
        id: id.to_string(),
        url: format!("https://stock.test/{}.mp4", id),
        duration_secs,
    }
}

/// Builder for `PipelineConfig` with fast, retry-free defaults.
pub struct PipelineConfigBuilder {
    workspace_root: PathBuf,
    max_concurrent: usize,
    retry: RetrySchedule,
    call_timeout: Duration,
    require_full_stock_coverage: bool,
}

impl PipelineConfigBuilder {
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            workspace_root: workspace_root.to_path_buf(),
            max_concurrent: 4,
            retry: RetrySchedule::none(),
            call_timeout: Duration::from_secs(5),
            require_full_stock_coverage: true,
        }
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// `retries` extra attempts with a 1ms wait before each.
    pub fn quick_retries(mut self, retries: usize) -> Self {
        self.retry = RetrySchedule::new(vec![Duration::from_millis(1); retries]);
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn require_full_stock_coverage(mut self, required: bool) -> Self {
        self.require_full_stock_coverage = required;
        self
    }

    pub fn build(self) -> PipelineConfig {
        PipelineConfig {
            workspace_root: self.workspace_root,
            fanout: FanoutSettings {
                max_concurrent: self.max_concurrent,
                retry: self.retry,
                call_timeout: self.call_timeout,
            },
            call_timeout: self.call_timeout,
            require_full_stock_coverage: self.require_full_stock_coverage,
            music_tracks: DEFAULT_MUSIC_TRACKS.iter().map(|t| t.to_string()).collect(),
        }
    }
}
