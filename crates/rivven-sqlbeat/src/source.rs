//! Row source abstraction
//!
//! A row source executes one query and hands back a forward-only cursor of
//! textual rows. Cells are raw text; SQL NULL is an empty string.
//!
//! - `RowSource`: executes query text, optionally reading only the first row
//! - `RowCursor`: column names plus sequential row iteration
//! - `BufferedCursor`: cursor over rows already fetched into memory
//! - `MemoryRowSource`: canned results keyed by query text

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};

use crate::error::{Error, Result};

/// One result row as raw text cells, aligned with the cursor's columns
pub type RawRow = Vec<String>;

/// Forward-only cursor over a query result
#[async_trait]
pub trait RowCursor: Send {
    /// Column names in result order
    fn columns(&self) -> &[String];

    /// Advance to the next row, `None` once the result is exhausted
    async fn next_row(&mut self) -> Result<Option<RawRow>>;
}

/// Something that can execute query text
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Execute a query and return a cursor over its result
    async fn query(&self, sql: &str) -> Result<Box<dyn RowCursor>>;

    /// Execute a query when only its first row will be read
    ///
    /// Sources that fetch eagerly can stop after one row; the cursor may
    /// then hold no more than that row.
    async fn query_first(&self, sql: &str) -> Result<Box<dyn RowCursor>> {
        self.query(sql).await
    }
}

/// Cursor over a fully fetched result
#[derive(Debug, Clone, Default)]
pub struct BufferedCursor {
    columns: Vec<String>,
    rows: VecDeque<RawRow>,
}

impl BufferedCursor {
    /// Create a cursor over `rows`
    pub fn new(columns: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }

    /// Rows not yet consumed
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl RowCursor for BufferedCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<RawRow>> {
        Ok(self.rows.pop_front())
    }
}

/// Canned result for `MemoryRowSource`
#[derive(Debug, Clone)]
enum CannedResult {
    Rows { columns: Vec<String>, rows: Vec<RawRow> },
    Failure(String),
}

/// Row source answering from an in-memory table of results
///
/// Unknown query text fails like a syntax error would.
#[derive(Debug, Clone, Default)]
pub struct MemoryRowSource {
    results: HashMap<String, CannedResult>,
}

impl MemoryRowSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` with the given columns and rows
    pub fn with_result<C, R>(mut self, sql: impl Into<String>, columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator,
        <R::Item as IntoIterator>::Item: Into<String>,
    {
        self.set_result(sql, columns, rows);
        self
    }

    /// Fail `sql` with the given message
    pub fn with_failure(mut self, sql: impl Into<String>, message: impl Into<String>) -> Self {
        self.results
            .insert(sql.into(), CannedResult::Failure(message.into()));
        self
    }

    /// Replace the answer for `sql`
    pub fn set_result<C, R>(&mut self, sql: impl Into<String>, columns: C, rows: R)
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator,
        <R::Item as IntoIterator>::Item: Into<String>,
    {
        let columns = columns.into_iter().map(Into::into).collect();
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        self.results
            .insert(sql.into(), CannedResult::Rows { columns, rows });
    }
}

#[async_trait]
impl RowSource for MemoryRowSource {
    async fn query(&self, sql: &str) -> Result<Box<dyn RowCursor>> {
        match self.results.get(sql) {
            Some(CannedResult::Rows { columns, rows }) => {
                Ok(Box::new(BufferedCursor::new(columns.clone(), rows.clone())))
            }
            Some(CannedResult::Failure(message)) => Err(Error::query_with_sql(message, sql)),
            None => Err(Error::query_with_sql("no result registered", sql)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffered_cursor_is_forward_only() {
        let mut cursor = BufferedCursor::new(
            vec!["a".into()],
            vec![vec!["1".into()], vec!["2".into()]],
        );
        assert_eq!(cursor.columns(), ["a".to_string()]);
        assert_eq!(cursor.next_row().await.unwrap(), Some(vec!["1".to_string()]));
        assert_eq!(cursor.remaining(), 1);
        assert_eq!(cursor.next_row().await.unwrap(), Some(vec!["2".to_string()]));
        assert_eq!(cursor.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_source_results() {
        let source = MemoryRowSource::new()
            .with_result("SELECT 1", ["one"], [["1"]])
            .with_failure("SELECT broken", "syntax error");

        let mut cursor = source.query("SELECT 1").await.unwrap();
        assert_eq!(cursor.columns(), ["one".to_string()]);
        assert_eq!(cursor.next_row().await.unwrap(), Some(vec!["1".to_string()]));

        let err = source.query("SELECT broken").await.err().unwrap();
        assert!(err.to_string().contains("syntax error"));
        assert!(err.is_per_query());

        assert!(source.query("SELECT 2").await.is_err());
    }
}
