//! Completion marking: take a published item out of the selectable pool.
//!
//! Consumption is not recorded anywhere; it is inferred from collection
//! membership. Once [`CompletionMarker::mark_consumed`] succeeds the item is
//! absent from subsequent listings of the source collection.

mod completion;
mod types;

pub use completion::CompletionMarker;
pub use types::*;
