//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ResourceStatus`: the persisted status of a tracked resource (queued, processing, done, error, stopped)
//! - `TaskStage`: the in-memory pipeline stage of one running crawl task

mod resource_status;
mod task_stage;

// Re-export main types
pub use resource_status::ResourceStatus;
pub use task_stage::TaskStage;
