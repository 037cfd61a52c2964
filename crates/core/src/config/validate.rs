use regex_lite::Regex;

use super::types::{CompletionPolicy, Config, NameFilterKind, StagingMode};
use super::ConfigError;

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

/// Validate configuration
///
/// Everything a run needs is checked here, so a misconfigured deployment fails
/// before any remote call is made.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let source = &config.source;

    if source.collection_id.trim().is_empty() {
        return Err(invalid("source.collection_id cannot be empty"));
    }

    if source.completion == CompletionPolicy::Relocate {
        match source.consumed_collection_id.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(invalid(
                    "source.consumed_collection_id is required when completion = \"relocate\"",
                ))
            }
            Some(consumed) if consumed == source.collection_id.trim() => {
                return Err(invalid(
                    "source.consumed_collection_id must differ from source.collection_id",
                ))
            }
            Some(_) => {}
        }
    }

    if source.accept == NameFilterKind::Pattern {
        Regex::new(&source.name_pattern)
            .map_err(|e| invalid(format!("source.name_pattern is invalid: {}", e)))?;
    }

    let ordering = Regex::new(&source.ordering_pattern)
        .map_err(|e| invalid(format!("source.ordering_pattern is invalid: {}", e)))?;
    if ordering.captures_len() < 2 {
        return Err(invalid(
            "source.ordering_pattern needs a capture group for the sequence number",
        ));
    }

    if source.drive.access_token.is_empty() {
        return Err(invalid("source.drive.access_token is not configured"));
    }

    let stager = &config.stager;
    match stager.mode {
        StagingMode::Retrieve => {
            if stager.publish_dir.is_none() {
                return Err(invalid("stager.publish_dir is required in retrieve mode"));
            }
            match stager.public_base_url.as_deref() {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                Some(_) => {
                    return Err(invalid("stager.public_base_url must be an http(s) URL"));
                }
                None => {
                    return Err(invalid(
                        "stager.public_base_url is required in retrieve mode",
                    ))
                }
            }
            if stager.probe_interval_ms == 0 || stager.probe_max_attempts == 0 {
                return Err(invalid(
                    "stager.probe_interval_ms and stager.probe_max_attempts must be positive",
                ));
            }
        }
        StagingMode::DirectLink => {
            if !stager.direct_link_template.contains("{id}") {
                return Err(invalid(
                    "stager.direct_link_template must contain the {id} placeholder",
                ));
            }
        }
    }

    let publisher = &config.publisher;
    if publisher.account_id.trim().is_empty() {
        return Err(invalid("publisher.account_id cannot be empty"));
    }
    if publisher.access_token.is_empty() {
        return Err(invalid("publisher.access_token is not configured"));
    }
    if publisher.caption.trim().is_empty() {
        return Err(invalid("publisher.caption cannot be empty"));
    }
    if publisher.poll_interval_ms == 0 || publisher.poll_max_attempts == 0 {
        return Err(invalid(
            "publisher.poll_interval_ms and publisher.poll_max_attempts must be positive",
        ));
    }

    if config.media.extensions().next().is_none() {
        return Err(invalid("media needs at least one video or image extension"));
    }

    Ok(())
}
