pub mod audit;
pub mod config;
pub mod edit;
pub mod error;
pub mod frontmatter;
pub mod gate;
pub mod io;
pub mod issues;
pub mod lifecycle;
pub mod manifest;
pub mod milestone;
pub mod paths;
pub mod search;
pub mod store;
pub mod task;
pub mod trash;
pub mod types;
pub mod verify;
pub mod workflow;

pub use error::{KanbanError, Result};
pub use store::TaskStore;
pub use task::TaskRecord;
pub use types::{Priority, Resolution, Status};
