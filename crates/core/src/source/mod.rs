//! Remote source collection abstraction.
//!
//! The source collection is the queue of candidate clips. This module provides
//! the `RemoteCollection` trait the pipeline reads and mutates, and the Google
//! Drive implementation used in production.

mod drive;
mod types;

pub use drive::DriveClient;
pub use types::*;
