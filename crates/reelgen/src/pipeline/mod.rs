pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;
pub mod stock;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{PipelineError, PipelineWarning};
pub use progress::{
    BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter, RecordingProgress,
};
pub use runner::{Pipeline, RunSummary};
pub use stock::{select_covering, StockSelection};
