use std::collections::HashSet;

use url::Url;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Search timeouts are positive and concurrency is at least 1
/// - Indexer ids are non-empty and unique, indexer URLs are http(s)
/// - Download client URLs are http(s)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    let search = &config.search;
    if search.adapter_timeout_secs == 0 || search.call_timeout_secs == 0 {
        return Err(invalid("search timeouts must be greater than 0"));
    }
    if search.max_concurrent_indexers == 0 {
        return Err(invalid("search.max_concurrent_indexers must be at least 1"));
    }

    let mut seen = HashSet::new();
    for indexer in &config.indexers {
        if indexer.id.trim().is_empty() {
            return Err(invalid("indexer id cannot be empty"));
        }
        if !seen.insert(indexer.id.as_str()) {
            return Err(invalid(&format!("duplicate indexer id '{}'", indexer.id)));
        }
        check_url(&format!("indexers.{}.base_url", indexer.id), &indexer.base_url)?;
        for mirror in &indexer.mirrors {
            check_url(&format!("indexers.{}.mirrors", indexer.id), mirror)?;
        }
        if indexer.rate_limit_rpm == Some(0) {
            return Err(invalid(&format!(
                "indexers.{}.rate_limit_rpm must be greater than 0",
                indexer.id
            )));
        }
    }

    if let Some(qbit) = &config.download_clients.qbittorrent {
        check_url("download_clients.qbittorrent.url", &qbit.url)?;
    }
    if let Some(sab) = &config.download_clients.sabnzbd {
        check_url("download_clients.sabnzbd.url", &sab.url)?;
    }

    Ok(())
}

fn check_url(field: &str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(invalid(&format!(
            "{} has unsupported scheme '{}'",
            field,
            url.scheme()
        ))),
        Err(e) => Err(invalid(&format!("{} is not a valid URL: {}", field, e))),
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
