pub mod config;
pub mod marker;
pub mod pipeline;
pub mod publisher;
pub mod selector;
pub mod source;
pub mod stager;
pub mod testing;
pub mod wait;

pub use config::{
    load_config, load_config_from_str, validate_config, CompletionPolicy, Config, ConfigError,
    SanitizedConfig, StagingMode,
};
pub use marker::{Completion, CompletionMarker, ConsumptionError, ConsumptionOutcome};
pub use pipeline::{PipelineError, PublicationPipeline, RunFailure, RunOutcome, RunReport, RunState};
pub use publisher::{
    GraphApiClient, MediaKind, PlatformError, ProcessingJob, ProcessingStatus, PublishError,
    PublishPlatform, PublishResult, PublishStage, PublisherClient,
};
pub use selector::{CandidateItem, ItemSelector, NameFilter, OrderingKey, SelectorError};
pub use source::{DriveClient, RemoteCollection, RemoteFile, SourceError};
pub use stager::{HttpProbe, ReachabilityProbe, StagedAsset, Stager, StagingError};
pub use wait::{bounded_wait, Check, WaitOutcome, WaitPolicy};
