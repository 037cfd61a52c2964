use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

use crate::publisher::MediaKind;
use crate::wait::WaitPolicy;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub source: SourceConfig,
    pub stager: StagerConfig,
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

/// Source collection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Collection (folder) holding the candidate clips.
    #[serde(deserialize_with = "id_string")]
    pub collection_id: String,
    /// Collection that receives consumed clips (required for `relocate`).
    #[serde(default, deserialize_with = "optional_id_string")]
    pub consumed_collection_id: Option<String>,
    /// What happens to a clip once it has been published.
    #[serde(default)]
    pub completion: CompletionPolicy,
    /// Permanently delete the clip if relocating it fails.
    #[serde(default)]
    pub delete_if_relocation_fails: bool,
    /// Which names are accepted as candidates.
    #[serde(default)]
    pub accept: NameFilterKind,
    /// Accepted-name pattern, used when `accept = "pattern"`.
    #[serde(default = "default_name_pattern")]
    pub name_pattern: String,
    /// Pattern whose first capture group is the numeric ordering key.
    #[serde(default = "default_ordering_pattern")]
    pub ordering_pattern: String,
    #[serde(default)]
    pub drive: DriveConfig,
}

/// Identifier given either as text or as a bare number.
///
/// Environment overrides parse digits-only values as integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Unsigned(n) => n.to_string(),
            RawId::Signed(n) => n.to_string(),
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_id_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

fn default_name_pattern() -> String {
    r"(?i)^clip_\d+\.mp4$".to_string()
}

fn default_ordering_pattern() -> String {
    r"(?i)clip_(\d+)".to_string()
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Move the clip into the consumed collection.
    #[default]
    Relocate,
    /// Permanently delete the clip.
    Delete,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NameFilterKind {
    /// Accept names with a configured video or image extension.
    Extensions,
    /// Accept names matching `name_pattern`.
    #[default]
    Pattern,
}

/// Google Drive API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriveConfig {
    #[serde(default = "default_drive_url")]
    pub api_url: String,
    /// Pre-provisioned OAuth access token.
    #[serde(default)]
    pub access_token: String,
    /// Request timeout in seconds (default: 60)
    #[serde(default = "default_drive_timeout")]
    pub timeout_secs: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_url: default_drive_url(),
            access_token: String::new(),
            timeout_secs: default_drive_timeout(),
        }
    }
}

fn default_drive_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_drive_timeout() -> u32 {
    60
}

/// Staging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagerConfig {
    #[serde(default)]
    pub mode: StagingMode,
    /// Locally-synced directory served by the public host (retrieve mode).
    #[serde(default)]
    pub publish_dir: Option<PathBuf>,
    /// Public URL of `publish_dir` (retrieve mode).
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Direct-download URL template; `{id}` is replaced by the file id.
    #[serde(default = "default_direct_link_template")]
    pub direct_link_template: String,
    /// Delay between reachability probes (milliseconds).
    #[serde(default = "default_probe_interval")]
    pub probe_interval_ms: u64,
    /// Number of reachability probes before giving up.
    #[serde(default = "default_probe_attempts")]
    pub probe_max_attempts: u32,
    /// Fixed wait before the first probe (milliseconds, default: 0).
    #[serde(default)]
    pub settle_delay_ms: u64,
    /// Probe request timeout in seconds (default: 15)
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u32,
}

impl StagerConfig {
    pub fn probe_policy(&self) -> WaitPolicy {
        WaitPolicy::from_millis(self.probe_interval_ms, self.probe_max_attempts)
    }
}

impl Default for StagerConfig {
    fn default() -> Self {
        Self {
            mode: StagingMode::default(),
            publish_dir: None,
            public_base_url: None,
            direct_link_template: default_direct_link_template(),
            probe_interval_ms: default_probe_interval(),
            probe_max_attempts: default_probe_attempts(),
            settle_delay_ms: 0,
            timeout_secs: default_probe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StagingMode {
    /// Download into the publish directory and wait for the host to serve it.
    #[default]
    Retrieve,
    /// Link straight to the remote store.
    DirectLink,
}

fn default_direct_link_template() -> String {
    "https://drive.google.com/uc?export=download&id={id}".to_string()
}

fn default_probe_interval() -> u64 {
    10_000 // 10 seconds
}

fn default_probe_attempts() -> u32 {
    30
}

fn default_probe_timeout() -> u32 {
    15
}

/// Publishing platform configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherConfig {
    #[serde(default = "default_graph_url")]
    pub api_url: String,
    /// Account (Instagram business user id) the media is published to.
    #[serde(deserialize_with = "id_string")]
    pub account_id: String,
    /// Long-lived access token.
    #[serde(default)]
    pub access_token: String,
    /// Caption attached to every post.
    pub caption: String,
    /// Delay between status polls (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Number of status polls before giving up.
    #[serde(default = "default_poll_attempts")]
    pub poll_max_attempts: u32,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_publisher_timeout")]
    pub timeout_secs: u32,
}

impl PublisherConfig {
    pub fn poll_policy(&self) -> WaitPolicy {
        WaitPolicy::from_millis(self.poll_interval_ms, self.poll_max_attempts)
    }
}

fn default_graph_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_poll_interval() -> u64 {
    5_000 // 5 seconds
}

fn default_poll_attempts() -> u32 {
    60
}

fn default_publisher_timeout() -> u32 {
    30
}

/// Media-kind detection rule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            video_extensions: default_video_extensions(),
            image_extensions: default_image_extensions(),
        }
    }
}

impl MediaConfig {
    /// Media kind of a file name, judged by its extension.
    pub fn kind_of(&self, name: &str) -> Option<MediaKind> {
        let (_, ext) = name.rsplit_once('.')?;
        let matches = |list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(ext));

        if matches(&self.video_extensions) {
            Some(MediaKind::Video)
        } else if matches(&self.image_extensions) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }

    /// All accepted extensions.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.video_extensions
            .iter()
            .chain(self.image_extensions.iter())
            .map(String::as_str)
    }
}

fn default_video_extensions() -> Vec<String> {
    vec!["mp4".to_string(), "mov".to_string(), "m4v".to_string()]
}

fn default_image_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub source: SanitizedSourceConfig,
    pub stager: StagerConfig,
    pub publisher: SanitizedPublisherConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSourceConfig {
    pub collection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_collection_id: Option<String>,
    pub completion: CompletionPolicy,
    pub delete_if_relocation_fails: bool,
    pub accept: NameFilterKind,
    pub name_pattern: String,
    pub ordering_pattern: String,
    pub drive_api_url: String,
    pub drive_token_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPublisherConfig {
    pub api_url: String,
    pub account_id: String,
    pub access_token_configured: bool,
    pub caption_chars: usize,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let source = &config.source;
        let publisher = &config.publisher;
        Self {
            source: SanitizedSourceConfig {
                collection_id: source.collection_id.clone(),
                consumed_collection_id: source.consumed_collection_id.clone(),
                completion: source.completion,
                delete_if_relocation_fails: source.delete_if_relocation_fails,
                accept: source.accept,
                name_pattern: source.name_pattern.clone(),
                ordering_pattern: source.ordering_pattern.clone(),
                drive_api_url: source.drive.api_url.clone(),
                drive_token_configured: !source.drive.access_token.is_empty(),
            },
            stager: config.stager.clone(),
            publisher: SanitizedPublisherConfig {
                api_url: publisher.api_url.clone(),
                account_id: publisher.account_id.clone(),
                access_token_configured: !publisher.access_token.is_empty(),
                caption_chars: publisher.caption.chars().count(),
                poll_interval_ms: publisher.poll_interval_ms,
                poll_max_attempts: publisher.poll_max_attempts,
                timeout_secs: publisher.timeout_secs,
            },
            media: config.media.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[source]
collection_id = "src-folder"
consumed_collection_id = "posted-folder"

[stager]
publish_dir = "media"
public_base_url = "https://someone.github.io/clips/media"

[publisher]
account_id = "17841400000000000"
caption = "hello"
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.source.collection_id, "src-folder");
        assert_eq!(config.source.completion, CompletionPolicy::Relocate);
        assert_eq!(config.source.accept, NameFilterKind::Pattern);
        assert_eq!(config.source.drive.api_url, "https://www.googleapis.com/drive/v3");
        assert_eq!(config.stager.mode, StagingMode::Retrieve);
        assert_eq!(config.stager.probe_interval_ms, 10_000);
        assert_eq!(config.stager.probe_max_attempts, 30);
        assert_eq!(config.publisher.api_url, "https://graph.facebook.com/v19.0");
        assert_eq!(config.publisher.poll_interval_ms, 5_000);
        assert_eq!(config.publisher.poll_max_attempts, 60);
        assert_eq!(config.media.video_extensions, vec!["mp4", "mov", "m4v"]);
    }

    #[test]
    fn test_deserialize_missing_publisher_fails() {
        let toml = r#"
[source]
collection_id = "src"

[stager]
mode = "direct_link"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_delete_policy_and_extension_filter() {
        let toml = r#"
[source]
collection_id = "src"
completion = "delete"
accept = "extensions"

[stager]
mode = "direct_link"

[publisher]
account_id = "1"
caption = "c"

[media]
video_extensions = ["mp4"]
image_extensions = ["webp"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.source.completion, CompletionPolicy::Delete);
        assert_eq!(config.source.accept, NameFilterKind::Extensions);
        assert_eq!(config.stager.mode, StagingMode::DirectLink);
        assert_eq!(config.media.image_extensions, vec!["webp"]);
    }

    #[test]
    fn test_deserialize_numeric_ids_as_text() {
        let toml = r#"
[source]
collection_id = 1234
consumed_collection_id = 5678

[stager]
mode = "direct_link"

[publisher]
account_id = 17841400000000000
caption = "c"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.source.collection_id, "1234");
        assert_eq!(config.source.consumed_collection_id.as_deref(), Some("5678"));
        assert_eq!(config.publisher.account_id, "17841400000000000");
    }

    #[test]
    fn test_media_kind_detection() {
        let media = MediaConfig::default();
        assert_eq!(media.kind_of("clip_1.mp4"), Some(MediaKind::Video));
        assert_eq!(media.kind_of("CLIP_1.MOV"), Some(MediaKind::Video));
        assert_eq!(media.kind_of("cover.JPEG"), Some(MediaKind::Image));
        assert_eq!(media.kind_of("notes.txt"), None);
        assert_eq!(media.kind_of("no_extension"), None);
    }

    #[test]
    fn test_policies_from_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(
            config.publisher.poll_policy(),
            WaitPolicy::from_millis(5_000, 60)
        );
        assert_eq!(
            config.stager.probe_policy(),
            WaitPolicy::from_millis(10_000, 30)
        );
    }

    #[test]
    fn test_sanitized_config_hides_tokens() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.publisher.access_token = "secret-token".to_string();

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.publisher.access_token_configured);
        assert!(!sanitized.source.drive_token_configured);
        assert_eq!(sanitized.publisher.caption_chars, 5);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-token"));
    }
}
