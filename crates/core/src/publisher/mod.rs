//! Publishing platform abstraction.
//!
//! Publishing is a two-phase asynchronous protocol: a job is created from a
//! public media URL, the platform processes it in the background, and a final
//! request makes the processed job visible. `PublishPlatform` is the raw
//! three-call API; `PublisherClient` drives it as a linear state machine with
//! one bounded wait.

mod client;
mod graph_api;
mod types;

pub use client::PublisherClient;
pub use graph_api::GraphApiClient;
pub use types::*;
