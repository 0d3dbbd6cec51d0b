//! Configuration for rivven-sqlbeat
//!
//! Loaded from YAML with `${VAR}` / `${VAR:-default}` expansion:
//!
//! ```yaml
//! sqlbeat:
//!   period: 10s
//!   hostname: 127.0.0.1
//!   port: 3306
//!   username: sqlbeat_user
//!   password: ${SQLBEAT_PASSWORD:-sqlbeat_pass}
//!   queries:
//!     - SHOW GLOBAL STATUS LIKE 'Com_%'
//!   query_types:
//!     - two-columns
//! output:
//!   format: json
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use validator::Validate;

use crate::assembler::{RowAssembler, DEFAULT_DELTA_MARKER, DEFAULT_SCALAR_COLUMN};
use crate::dispatcher::{Dispatcher, QueryDescriptor, QueryMode, DEFAULT_EVENT_KIND};
use crate::error::{Error, Result};
use crate::publisher::OutputFormat;
use crate::types::SensitiveString;

/// Pre-compiled regex for environment variable expansion
/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Polling settings
    #[serde(default)]
    pub sqlbeat: BeatConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Polling settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct BeatConfig {
    /// Interval between cycles
    #[serde(default = "default_period", with = "humantime_serde")]
    pub period: Duration,

    /// Database host
    #[serde(default = "default_hostname")]
    #[validate(length(min = 1, max = 255))]
    pub hostname: String,

    /// Database port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Database user
    #[serde(default = "default_username")]
    #[validate(length(min = 1))]
    pub username: String,

    /// Database password
    #[serde(default = "default_password")]
    pub password: SensitiveString,

    /// Default schema for the connection
    #[serde(default)]
    pub database: Option<String>,

    /// Query texts, executed in order every cycle
    #[serde(default)]
    pub queries: Vec<String>,

    /// Mode of each query, by position
    #[serde(default)]
    pub query_types: Vec<String>,

    /// Suffix marking counter columns
    #[serde(default = "default_delta_wildcard")]
    #[validate(length(min = 1))]
    pub delta_wildcard: String,

    /// Column extracted by `show-slave-delay` queries
    #[serde(default = "default_scalar_column")]
    #[validate(length(min = 1))]
    pub scalar_column: String,

    /// Keep delta baselines per query instead of per column name
    #[serde(default)]
    pub delta_namespace_by_query: bool,

    /// Kind tag of emitted events
    #[serde(default = "default_event_kind")]
    #[validate(length(min = 1))]
    pub event_kind: String,
}

fn default_period() -> Duration {
    Duration::from_secs(10)
}

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_username() -> String {
    "sqlbeat_user".to_string()
}

fn default_password() -> SensitiveString {
    SensitiveString::new("sqlbeat_pass")
}

fn default_delta_wildcard() -> String {
    DEFAULT_DELTA_MARKER.to_string()
}

fn default_scalar_column() -> String {
    DEFAULT_SCALAR_COLUMN.to_string()
}

fn default_event_kind() -> String {
    DEFAULT_EVENT_KIND.to_string()
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
            hostname: default_hostname(),
            port: default_port(),
            username: default_username(),
            password: default_password(),
            database: None,
            queries: Vec::new(),
            query_types: Vec::new(),
            delta_wildcard: default_delta_wildcard(),
            scalar_column: default_scalar_column(),
            delta_namespace_by_query: false,
            event_kind: default_event_kind(),
        }
    }
}

impl BeatConfig {
    /// Parse every query type
    pub fn modes(&self) -> Result<Vec<QueryMode>> {
        self.query_types.iter().map(|t| t.parse()).collect()
    }

    /// Queries paired with their modes
    pub fn descriptors(&self) -> Result<Vec<QueryDescriptor>> {
        QueryDescriptor::pair(&self.queries, &self.modes()?)
    }

    /// Row assembler for these settings
    pub fn assembler(&self) -> RowAssembler {
        RowAssembler::new(&self.delta_wildcard, &self.scalar_column)
            .with_namespace_by_query(self.delta_namespace_by_query)
    }

    /// Dispatcher running the configured queries
    pub fn dispatcher(&self) -> Result<Dispatcher> {
        Ok(Dispatcher::new(self.descriptors()?, self.assembler())
            .with_event_kind(&self.event_kind))
    }
}

/// Output settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Event encoding on stdout
    #[serde(default)]
    pub format: OutputFormat,
}

impl Config {
    /// Load and validate configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);

        let config: Self = serde_yaml::from_str(&expanded)
            .map_err(|e| Error::config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables in the format ${VAR} or ${VAR:-default}
    fn expand_env_vars(content: &str) -> String {
        ENV_VAR_REGEX
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default = caps.get(2).map(|m| m.as_str());

                std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
            })
            .to_string()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let beat = &self.sqlbeat;
        Validate::validate(beat)
            .map_err(|e| Error::config(format!("invalid sqlbeat settings: {}", e)))?;

        if beat.period.is_zero() {
            return Err(Error::config("period must be greater than zero"));
        }
        if beat.queries.iter().any(|q| q.trim().is_empty()) {
            return Err(Error::config("queries must not contain empty entries"));
        }

        beat.descriptors()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
sqlbeat:
  queries:
    - SHOW GLOBAL STATUS
  query_types:
    - two-columns
"#;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let beat = &config.sqlbeat;
        assert_eq!(beat.period, Duration::from_secs(10));
        assert_eq!(beat.hostname, "127.0.0.1");
        assert_eq!(beat.port, 3306);
        assert_eq!(beat.username, "sqlbeat_user");
        assert_eq!(beat.password.expose_secret(), "sqlbeat_pass");
        assert_eq!(beat.delta_wildcard, "__DELTA");
        assert_eq!(beat.scalar_column, "Seconds_Behind_Master");
        assert_eq!(beat.event_kind, "sqlbeat");
        assert!(!beat.delta_namespace_by_query);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("SQLBEAT_TEST_HOST", "db.internal");
        let expanded =
            Config::expand_env_vars("host: ${SQLBEAT_TEST_HOST} port: ${SQLBEAT_TEST_UNSET:-3307}");
        assert_eq!(expanded, "host: db.internal port: 3307");
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let yaml = r#"
sqlbeat:
  queries: [SELECT 1, SELECT 2]
  query_types: [single-row]
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.category().is_fatal());
        assert!(err.to_string().contains("query_types"));
    }

    #[test]
    fn test_no_queries_rejected() {
        let err = Config::from_yaml("sqlbeat: {}").unwrap_err();
        assert!(err.to_string().contains("no queries"));
    }

    #[test]
    fn test_unknown_query_type_rejected() {
        let yaml = r#"
sqlbeat:
  queries: [SELECT 1]
  query_types: [three-columns]
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("three-columns"));
    }

    #[test]
    fn test_empty_delta_marker_rejected() {
        let yaml = r#"
sqlbeat:
  queries: [SELECT 1]
  query_types: [single-row]
  delta_wildcard: ""
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_password_is_redacted() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sqlbeat_pass"));
        assert!(debug.contains("[REDACTED]"));
    }
}
