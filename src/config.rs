use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::{
    error::{Error, Result},
    types::IdPolicy,
};

/// Which entity extractor the service runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Regex/heuristic extractor
    Pattern,
    /// No extractor: every ingestion is routed to the vector store
    None,
}

impl FromStr for ExtractorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pattern" => Ok(ExtractorKind::Pattern),
            "none" | "off" => Ok(ExtractorKind::None),
            other => Err(Error::Configuration(format!("unknown extractor: {}", other))),
        }
    }
}

/// Configuration for the engine and the HTTP service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Embedding dimension shared by every document and query
    pub embedding_dim: usize,

    /// Remote embedding endpoint; the local hashing embedder is used when unset
    pub embedding_url: Option<String>,

    /// Model name sent to the remote embedding endpoint
    pub embedding_model: String,

    /// Multiplier applied to top_k when fetching vector candidates
    pub oversample_factor: usize,

    /// Engine-wide cap on traversal depth
    pub max_hops: usize,

    /// Ceiling on nodes visited by a single traversal
    pub max_visited_nodes: usize,

    /// Also store a document when entities were extracted
    pub dual_write: bool,

    /// How stores treat an add whose id already exists
    pub id_policy: IdPolicy,

    /// Deadline applied to every engine request, in milliseconds
    pub request_timeout_ms: u64,

    /// Entity extractor used by ingestion
    pub extractor: ExtractorKind,

    /// Maximum accepted request body size
    pub max_body_bytes: usize,

    /// top_k used when a search request omits it
    pub default_top_k: usize,
}

fn var_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| Error::Configuration(format!("invalid value for {}: {}", name, raw))),
        _ => Ok(default),
    }
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            bind_addr: var_or("BIND_ADDR", defaults.bind_addr)?,
            embedding_dim: var_or("EMBEDDING_DIM", defaults.embedding_dim)?,
            embedding_url: env::var("EMBEDDING_URL").ok().filter(|u| !u.trim().is_empty()),
            embedding_model: var_or("EMBEDDING_MODEL", defaults.embedding_model)?,
            oversample_factor: var_or("OVERSAMPLE_FACTOR", defaults.oversample_factor)?,
            max_hops: var_or("MAX_HOPS", defaults.max_hops)?,
            max_visited_nodes: var_or("MAX_VISITED_NODES", defaults.max_visited_nodes)?,
            dual_write: var_or("DUAL_WRITE", defaults.dual_write)?,
            id_policy: var_or("ID_POLICY", defaults.id_policy)?,
            request_timeout_ms: var_or("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms)?,
            extractor: var_or("EXTRACTOR", defaults.extractor)?,
            max_body_bytes: var_or("MAX_BODY_BYTES", defaults.max_body_bytes)?,
            default_top_k: var_or("DEFAULT_TOP_K", defaults.default_top_k)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a new configuration for testing
    pub fn for_testing() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            embedding_dim: 64,
            embedding_url: None,
            embedding_model: "hashing".to_string(),
            oversample_factor: 3,
            max_hops: 5,
            max_visited_nodes: 1_000,
            dual_write: true,
            id_policy: IdPolicy::Reject,
            request_timeout_ms: 5_000,
            extractor: ExtractorKind::Pattern,
            max_body_bytes: 1024 * 1024,
            default_top_k: 5,
        }
    }

    /// Reject settings that would make the engine unusable
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(Error::Configuration("EMBEDDING_DIM must be at least 1".into()));
        }
        if self.oversample_factor == 0 {
            return Err(Error::Configuration("OVERSAMPLE_FACTOR must be at least 1".into()));
        }
        if self.max_hops == 0 {
            return Err(Error::Configuration("MAX_HOPS must be at least 1".into()));
        }
        if self.max_visited_nodes == 0 {
            return Err(Error::Configuration("MAX_VISITED_NODES must be at least 1".into()));
        }
        if self.default_top_k == 0 {
            return Err(Error::Configuration("DEFAULT_TOP_K must be at least 1".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            embedding_dim: 384,
            embedding_url: None,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            oversample_factor: 3,
            max_hops: 5,
            max_visited_nodes: 10_000,
            dual_write: true,
            id_policy: IdPolicy::Reject,
            request_timeout_ms: 10_000,
            extractor: ExtractorKind::Pattern,
            max_body_bytes: 50 * 1024 * 1024,
            default_top_k: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Only this test touches the process environment.
    #[test]
    fn test_config_from_env() {
        env::set_var("EMBEDDING_DIM", "128");
        env::set_var("ID_POLICY", "upsert");
        env::set_var("EXTRACTOR", "none");
        env::remove_var("MAX_HOPS");

        let config = Config::from_env().unwrap();
        assert_eq!(config.embedding_dim, 128);
        assert_eq!(config.id_policy, IdPolicy::Upsert);
        assert_eq!(config.extractor, ExtractorKind::None);
        assert_eq!(config.max_hops, 5);

        env::set_var("OVERSAMPLE_FACTOR", "lots");
        assert!(matches!(Config::from_env(), Err(Error::Configuration(_))));

        env::remove_var("EMBEDDING_DIM");
        env::remove_var("ID_POLICY");
        env::remove_var("EXTRACTOR");
        env::remove_var("OVERSAMPLE_FACTOR");
    }

    #[test]
    fn test_config_for_testing() {
        let config = Config::for_testing();
        assert_eq!(config.embedding_dim, 64);
        assert_eq!(config.oversample_factor, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_hop_cap() {
        let config = Config {
            max_hops: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
