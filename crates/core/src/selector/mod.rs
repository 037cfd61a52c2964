//! Candidate selection.
//!
//! Lists the source collection, keeps the names accepted by the deployment's
//! filter and picks the item with the lowest sequence number. The pick is
//! deterministic: an unchanged listing always yields the same item.

mod item_selector;
mod types;

pub use item_selector::ItemSelector;
pub use types::{CandidateItem, NameFilter, OrderingKey, SelectorError};
