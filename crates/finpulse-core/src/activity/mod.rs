//! Activity ingestion: the in-process queue and the per-kind processor
//! that the drain loop feeds.

mod processor;
mod queue;

pub use processor::{ActivityProcessor, DrainReport};
pub use queue::ActivityQueue;
