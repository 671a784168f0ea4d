pub mod workspace;

pub use workspace::{JobWorkspace, WorkspaceRoot};
