//! MySQL row source
//!
//! Queries run over the text protocol through a `mysql_async` pool, so every
//! cell already arrives as text. Rows are fetched before the cursor is
//! returned: the whole result for `query`, only the first row for
//! `query_first` (the remainder is read off the connection and discarded).
//! SQL NULL becomes an empty cell.

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{OptsBuilder, Pool};
use tracing::{debug, info};

use crate::config::BeatConfig;
use crate::error::{Error, Result};
use crate::source::{BufferedCursor, RawRow, RowCursor, RowSource};

/// Row source backed by a MySQL connection pool
pub struct MySqlRowSource {
    pool: Pool,
    endpoint: String,
}

impl MySqlRowSource {
    /// Build a pool from the connection settings
    ///
    /// No connection is opened until the first query.
    pub fn new(config: &BeatConfig) -> Self {
        let opts = OptsBuilder::default()
            .ip_or_hostname(config.hostname.clone())
            .tcp_port(config.port)
            .user(Some(config.username.clone()))
            .pass(Some(config.password.expose_secret().to_string()))
            .db_name(config.database.clone().filter(|db| !db.is_empty()));

        let endpoint = format!("{}:{}", config.hostname, config.port);
        info!(endpoint = %endpoint, user = %config.username, "MySQL pool configured");

        Self {
            pool: Pool::new(opts),
            endpoint,
        }
    }

    /// Host and port the pool connects to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check that the server is reachable
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.ping()
            .await
            .map_err(|e| Error::connection_with_source("ping failed", e))
    }

    /// Close every pooled connection
    pub async fn disconnect(self) -> Result<()> {
        self.pool
            .disconnect()
            .await
            .map_err(|e| Error::connection_with_source("failed to close pool", e))
    }

    async fn conn(&self) -> Result<mysql_async::Conn> {
        self.pool.get_conn().await.map_err(|e| {
            Error::connection_with_source(format!("failed to connect to {}", self.endpoint), e)
        })
    }
}

#[async_trait]
impl RowSource for MySqlRowSource {
    async fn query(&self, sql: &str) -> Result<Box<dyn RowCursor>> {
        let mut conn = self.conn().await?;

        let result = conn
            .query_iter(sql)
            .await
            .map_err(|e| Error::query_with_sql(format!("failed to execute query: {}", e), sql))?;

        let rows: Vec<mysql_async::Row> = result
            .collect_and_drop()
            .await
            .map_err(|e| Error::query_with_sql(format!("failed to read rows: {}", e), sql))?;

        Ok(buffered(rows))
    }

    async fn query_first(&self, sql: &str) -> Result<Box<dyn RowCursor>> {
        let mut conn = self.conn().await?;

        let mut result = conn
            .query_iter(sql)
            .await
            .map_err(|e| Error::query_with_sql(format!("failed to execute query: {}", e), sql))?;

        let first: Option<mysql_async::Row> = result
            .next()
            .await
            .map_err(|e| Error::query_with_sql(format!("failed to read rows: {}", e), sql))?;

        // the rest of the result still has to be drained off the wire
        result
            .drop_result()
            .await
            .map_err(|e| Error::query_with_sql(format!("failed to discard rows: {}", e), sql))?;

        Ok(buffered(first.into_iter().collect()))
    }
}

fn buffered(rows: Vec<mysql_async::Row>) -> Box<dyn RowCursor> {
    let columns: Vec<String> = rows
        .first()
        .map(|row| {
            row.columns_ref()
                .iter()
                .map(|c| c.name_str().to_string())
                .collect()
        })
        .unwrap_or_default();

    let rows: Vec<RawRow> = rows.into_iter().map(row_text).collect();
    debug!(rows = rows.len(), columns = columns.len(), "query fetched");

    Box::new(BufferedCursor::new(columns, rows))
}

fn row_text(row: mysql_async::Row) -> RawRow {
    (0..row.len())
        .map(|i| {
            let val: mysql_async::Value = row.get(i).unwrap_or(mysql_async::Value::NULL);
            cell_text(val)
        })
        .collect()
}

/// Render one cell the way the server would print it
fn cell_text(value: mysql_async::Value) -> String {
    use mysql_async::Value;

    match value {
        Value::NULL => String::new(),
        Value::Bytes(b) => String::from_utf8_lossy(&b).into_owned(),
        Value::Int(n) => n.to_string(),
        Value::UInt(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Date(year, month, day, hour, min, sec, micro) => {
            let mut text = format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, min, sec
            );
            if micro > 0 {
                text.push_str(&format!(".{:06}", micro));
            }
            text
        }
        Value::Time(neg, days, hour, min, sec, micro) => {
            let hours = days * 24 + u32::from(hour);
            let mut text = format!(
                "{}{:02}:{:02}:{:02}",
                if neg { "-" } else { "" },
                hours,
                min,
                sec
            );
            if micro > 0 {
                text.push_str(&format!(".{:06}", micro));
            }
            text
        }
    }
}
