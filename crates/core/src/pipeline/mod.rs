//! Publication pipeline.
//!
//! A run moves one item through
//! `Selected → Staged → Submitted → Processed → Finalized → Consumed`.
//! There is no transaction spanning the three external systems; a failed run
//! reports the last state it reached and leaves recovery to the next run,
//! which starts again from the contents of the source collection.

mod runner;
mod types;

pub use runner::PublicationPipeline;
pub use types::*;
