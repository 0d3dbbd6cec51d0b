//! Error types for rivven-sqlbeat
//!
//! Errors are classified so the poll loop can tell a fatal startup problem
//! from a per-query failure:
//! - Configuration errors halt startup
//! - Connection and query errors lose one query for one cycle
//! - Publish errors are surfaced to the caller, never retried here

use std::fmt;
use thiserror::Error;

/// Result type for rivven-sqlbeat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid or inconsistent configuration (fatal at startup)
    Configuration,
    /// Could not reach the database
    Connection,
    /// Query failed to execute or its cursor failed mid-stream
    Query,
    /// Event could not be handed to the publisher
    Publish,
    /// Event could not be encoded
    Serialization,
}

impl ErrorCategory {
    /// Whether errors in this category only affect a single query of a cycle
    #[inline]
    pub const fn is_per_query(self) -> bool {
        matches!(self, Self::Connection | Self::Query)
    }

    /// Whether errors in this category must stop the process from starting
    #[inline]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Configuration)
    }
}

/// Main error type for rivven-sqlbeat
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Connection failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution failed
    #[error("query error: {message}")]
    Query {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Publishing an event failed
    #[error("publish error: {message}")]
    Publish {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Event encoding failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Query { .. } => ErrorCategory::Query,
            Self::Publish { .. } => ErrorCategory::Publish,
            Self::Serialization(_) => ErrorCategory::Serialization,
        }
    }

    /// Whether this error only affects a single query of a cycle
    #[inline]
    pub fn is_per_query(&self) -> bool {
        self.category().is_per_query()
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Create a query error with SQL
    pub fn query_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    /// Create a publish error
    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish {
            message: message.into(),
            source: None,
        }
    }

    /// Create a publish error with source
    pub fn publish_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Publish {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Connection => write!(f, "connection"),
            Self::Query => write!(f, "query"),
            Self::Publish => write!(f, "publish"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_scope() {
        assert!(ErrorCategory::Connection.is_per_query());
        assert!(ErrorCategory::Query.is_per_query());
        assert!(!ErrorCategory::Publish.is_per_query());

        assert!(ErrorCategory::Configuration.is_fatal());
        assert!(!ErrorCategory::Query.is_fatal());
    }

    #[test]
    fn test_error_category_of_variants() {
        assert_eq!(
            Error::config("bad").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(Error::query("boom").category(), ErrorCategory::Query);
        assert_eq!(Error::publish("closed").category(), ErrorCategory::Publish);
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(Error::connection_with_source("db down", refused).is_per_query());
    }

    #[test]
    fn test_error_display() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::connection_with_source("connection refused", refused);
        assert!(err.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());

        let err = Error::query_with_sql("syntax error", "SELEC 1");
        assert!(err.to_string().contains("syntax error"));

        assert_eq!(ErrorCategory::Publish.to_string(), "publish");
    }
}
