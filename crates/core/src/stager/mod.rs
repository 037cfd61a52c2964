//! Staging: making a selected item reachable at a public URL.
//!
//! Two modes are supported:
//!
//! - **Retrieve**: stream the item into the locally-synced publish directory,
//!   then probe the public host until it serves the file.
//! - **Direct link**: build a download URL on the remote store itself; the
//!   link is usable immediately so no probe is made.
//!
//! Readiness probing is the only retry inside the stager. Anything else that
//! fails here fails the whole run.

mod error;
mod probe;
mod staging;
mod types;

pub use error::StagingError;
pub use probe::{HttpProbe, ReachabilityProbe};
pub use staging::Stager;
pub use types::StagedAsset;
