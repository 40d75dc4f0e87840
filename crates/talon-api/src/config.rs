// Talon
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Configuration management for the analysis API

use std::env;
use std::path::PathBuf;
use talon_core::enrichment::DEFAULT_ENRICH_CONCURRENCY;
use talon_core::usage::{DEFAULT_FREE_TIER_LIMIT, DEFAULT_UPGRADE_URL};

const DEFAULT_PORT: &str = "5000";
const DEFAULT_JWT_SECRET: &str = "default-secret-change-in-production";
const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;

/// Configuration for the analysis API
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// JWT secret key for bearer credentials
    pub jwt_secret: String,

    /// Allowed CORS origins, `*` allows any
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Monthly free-tier request quota
    pub free_tier_limit: u32,

    /// Upgrade pointer returned with quota rejections
    pub upgrade_url: String,

    /// Key anonymous usage by client IP instead of one shared bucket
    pub anonymous_per_ip: bool,

    /// Persist usage counters to this JSON file
    pub usage_store_path: Option<PathBuf>,

    /// Base URL of a Chroma-compatible vector store
    pub chroma_url: Option<String>,

    /// Curated prevention rules collection
    pub rules_collection: String,

    /// Community answers collection
    pub community_collection: String,

    /// JSON seed file for an in-memory rules store
    pub rules_file: Option<PathBuf>,

    /// JSON seed file for an in-memory community store
    pub community_file: Option<PathBuf>,

    /// Per-query document store timeout in milliseconds
    pub store_timeout_ms: u64,

    /// Findings enriched at once per request
    pub enrich_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", DEFAULT_PORT),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            cors_origins: vec!["*".to_string()],
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            free_tier_limit: DEFAULT_FREE_TIER_LIMIT,
            upgrade_url: DEFAULT_UPGRADE_URL.to_string(),
            anonymous_per_ip: false,
            usage_store_path: None,
            chroma_url: None,
            rules_collection: "prevention_rules".to_string(),
            community_collection: "community_solutions".to_string(),
            rules_file: None,
            community_file: None,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            enrich_concurrency: DEFAULT_ENRICH_CONCURRENCY,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            bind_address: lookup("TALON_API_BIND_ADDRESS")
                .unwrap_or_else(|| format!("0.0.0.0:{}", lookup("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string()))),

            jwt_secret: lookup("TALON_JWT_SECRET").unwrap_or(defaults.jwt_secret),

            cors_origins: lookup("TALON_CORS_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(defaults.cors_origins),

            max_body_size: lookup("TALON_MAX_BODY_SIZE").and_then(|v| v.parse().ok()).unwrap_or(defaults.max_body_size),

            free_tier_limit: lookup("TALON_FREE_TIER_LIMIT").and_then(|v| v.parse().ok()).unwrap_or(defaults.free_tier_limit),

            upgrade_url: lookup("TALON_UPGRADE_URL").unwrap_or(defaults.upgrade_url),

            anonymous_per_ip: lookup("TALON_ANONYMOUS_PER_IP").and_then(|v| v.parse().ok()).unwrap_or(defaults.anonymous_per_ip),

            usage_store_path: lookup("TALON_USAGE_STORE_PATH").map(PathBuf::from),

            chroma_url: lookup("TALON_CHROMA_URL"),

            rules_collection: lookup("TALON_RULES_COLLECTION").unwrap_or(defaults.rules_collection),

            community_collection: lookup("TALON_COMMUNITY_COLLECTION").unwrap_or(defaults.community_collection),

            rules_file: lookup("TALON_RULES_FILE").map(PathBuf::from),

            community_file: lookup("TALON_COMMUNITY_FILE").map(PathBuf::from),

            store_timeout_ms: lookup("TALON_STORE_TIMEOUT_MS").and_then(|v| v.parse().ok()).unwrap_or(defaults.store_timeout_ms),

            enrich_concurrency: lookup("TALON_ENRICH_CONCURRENCY")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.enrich_concurrency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.bind_address, "0.0.0.0:5000");
        assert_eq!(config.free_tier_limit, 100);
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
        assert!(config.chroma_url.is_none());
        assert!(!config.anonymous_per_ip);
    }

    #[test]
    fn test_port_used_when_bind_address_unset() {
        assert_eq!(config_from(&[("PORT", "8080")]).bind_address, "0.0.0.0:8080");
        assert_eq!(
            config_from(&[("PORT", "8080"), ("TALON_API_BIND_ADDRESS", "127.0.0.1:9000")]).bind_address,
            "127.0.0.1:9000"
        );
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = config_from(&[
            ("TALON_FREE_TIER_LIMIT", "5"),
            ("TALON_MAX_BODY_SIZE", "not-a-number"),
            ("TALON_CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("TALON_ANONYMOUS_PER_IP", "true"),
            ("TALON_RULES_FILE", "/data/rules.json"),
        ]);

        assert_eq!(config.free_tier_limit, 5);
        assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
        assert_eq!(config.cors_origins, vec!["http://a.test".to_string(), "http://b.test".to_string()]);
        assert!(config.anonymous_per_ip);
        assert_eq!(config.rules_file, Some(PathBuf::from("/data/rules.json")));
    }

    #[test]
    fn test_enrich_concurrency() {
        assert_eq!(config_from(&[]).enrich_concurrency, DEFAULT_ENRICH_CONCURRENCY);
        assert_eq!(config_from(&[("TALON_ENRICH_CONCURRENCY", "4")]).enrich_concurrency, 4);
        assert_eq!(config_from(&[("TALON_ENRICH_CONCURRENCY", "0")]).enrich_concurrency, DEFAULT_ENRICH_CONCURRENCY);
    }
}
