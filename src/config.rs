//! Startup configuration.
//!
//! The three connection values (endpoint, API key, index name) always come
//! from the environment and are validated before anything else happens.
//! Everything else is layered: profile defaults, then an optional TOML file,
//! then environment overrides.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::tools::KNOWN_TOOLS;

pub const ENV_ENDPOINT: &str = "AZURE_SEARCH_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_SEARCH_API_KEY";
pub const ENV_INDEX_NAME: &str = "AZURE_SEARCH_INDEX_NAME";

pub const ENV_API_VERSION: &str = "AZURE_SEARCH_API_VERSION";
pub const ENV_SEMANTIC_CONFIG: &str = "AZURE_SEARCH_SEMANTIC_CONFIG";
pub const ENV_VECTOR_FIELDS: &str = "AZURE_SEARCH_VECTOR_FIELDS";
pub const ENV_ENABLED_TOOLS: &str = "AZURE_SEARCH_ENABLED_TOOLS";

/// Required variables, in the order they are reported when missing.
pub const REQUIRED_VARS: [&str; 3] = [ENV_ENDPOINT, ENV_API_KEY, ENV_INDEX_NAME];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<&'static str>),
}

/// Transport personality, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Persistent HTTP endpoint (MCP streamable HTTP).
    #[value(name = "streamable-http")]
    StreamableHttp,
    /// Legacy local-process mode over stdin/stdout.
    Stdio,
    /// Legacy server-sent events endpoint.
    Sse,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransportKind::StreamableHttp => "streamable-http",
            TransportKind::Stdio => "stdio",
            TransportKind::Sse => "sse",
        };
        f.write_str(name)
    }
}

/// Named deployment defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Profile {
    /// Streamable HTTP on port 8000, `top = 5`, hybrid search only.
    #[default]
    Standard,
    /// stdio, port 8080, `top = 30`, hybrid and semantic search.
    Legacy,
}

impl Profile {
    pub fn default_transport(self) -> TransportKind {
        match self {
            Profile::Standard => TransportKind::StreamableHttp,
            Profile::Legacy => TransportKind::Stdio,
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Profile::Standard => 8000,
            Profile::Legacy => 8080,
        }
    }

    pub fn default_top(self) -> u32 {
        match self {
            Profile::Standard => 5,
            Profile::Legacy => 30,
        }
    }

    pub fn enabled_tools(self) -> Vec<String> {
        let names: &[&str] = match self {
            Profile::Standard => &["hybrid_search"],
            Profile::Legacy => &["hybrid_search", "semantic_search"],
        };
        names.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub search: SearchConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: String,
    pub index_name: String,
    pub api_version: String,
    /// Semantic ranker configuration; semantic search falls back to a
    /// simple query when unset.
    pub semantic_configuration: Option<String>,
    /// Comma-separated vector fields used for the vector leg of hybrid search.
    pub vector_fields: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub enabled: Vec<String>,
    pub default_top: u32,
}

/// The three required connection values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub endpoint: String,
    pub api_key: String,
    pub index_name: String,
}

// ============ Optional TOML file ============

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    search: FileSearch,
    #[serde(default)]
    tools: FileTools,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileSearch {
    api_version: Option<String>,
    semantic_configuration: Option<String>,
    vector_fields: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileTools {
    enabled: Option<Vec<String>>,
    default_top: Option<u32>,
}

fn default_api_version() -> String {
    "2024-07-01".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Checks that every required variable is present and non-empty.
///
/// All missing names are collected so the operator sees the full set at once.
pub fn validate_required<F>(lookup: F) -> Result<Connection, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let values = REQUIRED_VARS.map(|name| lookup(name).filter(|v| !v.trim().is_empty()));

    let missing: Vec<&'static str> = REQUIRED_VARS
        .iter()
        .zip(&values)
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ConfigError::MissingEnv(missing));
    }

    let [endpoint, api_key, index_name] = values.map(Option::unwrap_or_default);
    Ok(Connection {
        endpoint,
        api_key,
        index_name,
    })
}

/// Builds the full configuration from a validated connection, the profile,
/// an optional config file, and environment overrides.
pub fn load_config<F>(
    connection: Connection,
    profile: Profile,
    path: Option<&Path>,
    lookup: F,
) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<FileConfig>(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        }
        None => FileConfig::default(),
    };

    let env = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let enabled = match env(ENV_ENABLED_TOOLS) {
        Some(list) => parse_tool_list(&list),
        None => file.tools.enabled.unwrap_or_else(|| profile.enabled_tools()),
    };

    let config = Config {
        search: SearchConfig {
            endpoint: connection.endpoint.trim_end_matches('/').to_string(),
            api_key: connection.api_key,
            index_name: connection.index_name,
            api_version: env(ENV_API_VERSION)
                .or(file.search.api_version)
                .unwrap_or_else(default_api_version),
            semantic_configuration: env(ENV_SEMANTIC_CONFIG).or(file.search.semantic_configuration),
            vector_fields: env(ENV_VECTOR_FIELDS).or(file.search.vector_fields),
            timeout_secs: file.search.timeout_secs.unwrap_or_else(default_timeout_secs),
        },
        tools: ToolsConfig {
            enabled,
            default_top: file.tools.default_top.unwrap_or_else(|| profile.default_top()),
        },
    };

    validate(&config)?;
    Ok(config)
}

fn parse_tool_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate(config: &Config) -> Result<()> {
    let url = reqwest::Url::parse(&config.search.endpoint)
        .with_context(|| format!("{} is not a valid URL: {}", ENV_ENDPOINT, config.search.endpoint))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        bail!("{} must use http or https, got '{}'", ENV_ENDPOINT, url.scheme());
    }

    if config.tools.default_top == 0 {
        bail!("tools.default_top must be >= 1");
    }
    if config.search.timeout_secs == 0 {
        bail!("search.timeout_secs must be >= 1");
    }

    for name in &config.tools.enabled {
        if !KNOWN_TOOLS.contains(&name.as_str()) {
            bail!(
                "Unknown tool '{}' in enabled tools. Must be one of: {}",
                name,
                KNOWN_TOOLS.join(", ")
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_ENDPOINT, "https://example.search.windows.net"),
            (ENV_API_KEY, "secret"),
            (ENV_INDEX_NAME, "docs"),
        ]
    }

    fn connection() -> Connection {
        validate_required(env_of(&full_env())).unwrap()
    }

    #[test]
    fn all_required_present() {
        let conn = connection();
        assert_eq!(conn.endpoint, "https://example.search.windows.net");
        assert_eq!(conn.api_key, "secret");
        assert_eq!(conn.index_name, "docs");
    }

    #[test]
    fn each_missing_var_is_named_alone() {
        for omitted in REQUIRED_VARS {
            let pairs: Vec<_> = full_env().into_iter().filter(|(k, _)| *k != omitted).collect();
            let err = validate_required(env_of(&pairs)).unwrap_err();
            assert_eq!(err, ConfigError::MissingEnv(vec![omitted]));
            assert_eq!(
                err.to_string(),
                format!("Missing required environment variables: {}", omitted)
            );
        }
    }

    #[test]
    fn all_missing_listed_in_order() {
        let err = validate_required(env_of(&[])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: AZURE_SEARCH_ENDPOINT, AZURE_SEARCH_API_KEY, AZURE_SEARCH_INDEX_NAME"
        );
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let mut pairs = full_env();
        pairs[1] = (ENV_API_KEY, "");
        let err = validate_required(env_of(&pairs)).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnv(vec![ENV_API_KEY]));
    }

    #[test]
    fn profile_defaults() {
        let cfg = load_config(connection(), Profile::Standard, None, env_of(&[])).unwrap();
        assert_eq!(cfg.tools.enabled, vec!["hybrid_search"]);
        assert_eq!(cfg.tools.default_top, 5);
        assert_eq!(cfg.search.api_version, "2024-07-01");

        let cfg = load_config(connection(), Profile::Legacy, None, env_of(&[])).unwrap();
        assert_eq!(cfg.tools.enabled, vec!["hybrid_search", "semantic_search"]);
        assert_eq!(cfg.tools.default_top, 30);
        assert_eq!(Profile::Legacy.default_transport(), TransportKind::Stdio);
        assert_eq!(Profile::Legacy.default_port(), 8080);
    }

    #[test]
    fn trailing_slash_trimmed_from_endpoint() {
        let conn = Connection {
            endpoint: "https://example.search.windows.net/".to_string(),
            ..connection()
        };
        let cfg = load_config(conn, Profile::Standard, None, env_of(&[])).unwrap();
        assert_eq!(cfg.search.endpoint, "https://example.search.windows.net");
    }

    #[test]
    fn file_values_overridden_by_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"[search]
semantic_configuration = "from-file"
vector_fields = "contentVector"

[tools]
enabled = ["text_search", "fetch_document"]
default_top = 12
"#
        )
        .unwrap();

        let env = env_of(&[
            (ENV_SEMANTIC_CONFIG, "from-env"),
            (ENV_ENABLED_TOOLS, " filtered_search , fetch_document ,"),
        ]);
        let cfg = load_config(connection(), Profile::Standard, Some(file.path()), env).unwrap();
        assert_eq!(cfg.search.semantic_configuration.as_deref(), Some("from-env"));
        assert_eq!(cfg.search.vector_fields.as_deref(), Some("contentVector"));
        assert_eq!(cfg.tools.enabled, vec!["filtered_search", "fetch_document"]);
        assert_eq!(cfg.tools.default_top, 12);
    }

    #[test]
    fn unknown_tool_rejected() {
        let env = env_of(&[(ENV_ENABLED_TOOLS, "hybrid_search,delete_index")]);
        let err = load_config(connection(), Profile::Standard, None, env).unwrap_err();
        assert!(err.to_string().contains("delete_index"));
    }

    #[test]
    fn invalid_endpoint_rejected() {
        let conn = Connection {
            endpoint: "not a url".to_string(),
            ..connection()
        };
        assert!(load_config(conn, Profile::Standard, None, env_of(&[])).is_err());
    }

    #[test]
    fn zero_top_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tools]\ndefault_top = 0").unwrap();
        let err = load_config(connection(), Profile::Standard, Some(file.path()), env_of(&[]))
            .unwrap_err();
        assert!(err.to_string().contains("default_top"));
    }
}
