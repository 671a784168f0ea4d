use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::fanout::FanoutSettings;

pub struct PipelineConfig {
    pub workspace_root: PathBuf,
    pub fanout: FanoutSettings,
    /// Bound on every single collaborator call.
    pub call_timeout: Duration,
    pub require_full_stock_coverage: bool,
    pub music_tracks: Vec<String>,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let call_timeout = Duration::from_secs(config.timeouts.call_timeout_secs);
        Self {
            workspace_root: PathBuf::from(&config.workspace_root),
            fanout: FanoutSettings::from_config(&config.fanout, call_timeout),
            call_timeout,
            require_full_stock_coverage: config.stock.require_full_coverage,
            music_tracks: config.music.tracks.clone(),
        }
    }
}
