//! The video job record and the types it is built from.

pub mod input;
pub mod record;
pub mod segment;
pub mod stage;

pub use input::{
    InputError, MediaType, Narrator, VideoInput, VisualStyle, DEFAULT_MUSIC_TRACKS,
};
pub use record::{JobArtifacts, TransitionError, VideoJob, USER_FACING_ERROR};
pub use segment::{Segment, StockClip, Transcript};
pub use stage::{checkpoint, Stage, StageFlags, Step, VisualSource};
