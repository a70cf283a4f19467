//! Database connection management
//!
//! The engine talks to PostgreSQL through the [`Database`] trait. Catalog
//! and value queries bind their arguments as parameters and come back as
//! typed [`Row`]s; emitted DDL goes over the simple-query protocol.

pub mod queries;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// Bound query parameter
pub type Param<'a> = &'a (dyn ToSql + Sync);

/// A decoded column value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    TextArray(Vec<String>),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::TextArray(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One result row, column name to value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    pub fn new<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn value(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&Value::Null)
    }

    fn mismatch(column: &str, expected: &str, found: &Value) -> Error {
        Error::Query(format!("column `{}` is not {}: {:?}", column, expected, found))
    }

    /// Text value of `column`; `None` for SQL NULL, a missing column or a
    /// non-text value
    pub fn get(&self, column: &str) -> Option<&str> {
        match self.value(column) {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn get_i64(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::Int(value) => Ok(Some(*value)),
            other => Err(Self::mismatch(column, "an integer", other)),
        }
    }

    /// Integer value of a column that must not be NULL
    pub fn require_i64(&self, column: &str) -> Result<i64> {
        self.get_i64(column)?
            .ok_or_else(|| Error::Query(format!("column `{}` is missing", column)))
    }

    pub fn get_bool(&self, column: &str) -> Result<Option<bool>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::Bool(value) => Ok(Some(*value)),
            other => Err(Self::mismatch(column, "a boolean", other)),
        }
    }

    /// Text array of `column`; NULL reads as empty
    pub fn get_array(&self, column: &str) -> Result<Vec<String>> {
        match self.value(column) {
            Value::Null => Ok(Vec::new()),
            Value::TextArray(values) => Ok(values.clone()),
            other => Err(Self::mismatch(column, "a text array", other)),
        }
    }

    /// Text value of a column that must not be NULL
    pub fn require(&self, column: &str) -> Result<&str> {
        self.get(column)
            .ok_or_else(|| Error::Query(format!("column `{}` is missing", column)))
    }
}

/// A connected, query-capable client
#[async_trait]
pub trait Database: Send + Sync {
    /// Run a catalog or value query with bound parameters
    async fn query(&self, sql: &str, params: &[Param<'_>]) -> Result<Vec<Row>>;

    /// Run a statement over the simple-query protocol, discarding any rows
    async fn execute(&self, sql: &str) -> Result<()>;
}

/// PostgreSQL client holding a single pooled connection
pub struct PgClient {
    pool: Pool,
    client: Mutex<Option<Object>>,
}

impl PgClient {
    /// Connect using `config`. The pool is capped at one connection: the
    /// engine never runs statements concurrently.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = Self::create_pool(config)?;

        let client = pool.get().await?;
        client.simple_query("SELECT 1").await?;

        info!(
            host = %config.host,
            database = %config.database,
            tls = config.ssl,
            "Database connection established"
        );

        Ok(Self {
            pool,
            client: Mutex::new(Some(client)),
        })
    }

    /// Create a connection pool with given configuration
    fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.clone());
        cfg.dbname = Some(config.database.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(1));

        if config.ssl {
            let certs = rustls_native_certs::load_native_certs();
            let mut root_store = rustls::RootCertStore::empty();
            for cert in certs.certs {
                root_store.add(cert).ok();
            }

            let tls_config = rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth();
            let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

            cfg.create_pool(Some(Runtime::Tokio1), tls)
                .map_err(|e| Error::Config(format!("Failed to create TLS pool: {}", e)))
        } else {
            cfg.create_pool(Some(Runtime::Tokio1), NoTls)
                .map_err(|e| Error::Config(format!("Failed to create pool: {}", e)))
        }
    }

    /// Release the connection and close the pool
    pub async fn end(&self) {
        self.client.lock().await.take();
        self.pool.close();
        debug!("Database connection closed");
    }
}

/// Decode a server row into [`Value`]s by column type. Catalog queries
/// cast everything else to text.
fn decode(row: &tokio_postgres::Row) -> Result<Row> {
    let mut values = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(i)?.map(Value::Bool)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(i)?.map(|v| Value::Int(v.into()))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(i)?.map(|v| Value::Int(v.into()))
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(i)?.map(Value::Int)
        } else if *ty == Type::TEXT_ARRAY || *ty == Type::NAME_ARRAY {
            row.try_get::<_, Option<Vec<String>>>(i)?.map(Value::TextArray)
        } else {
            row.try_get::<_, Option<String>>(i)?.map(Value::Text)
        };
        values.push((column.name().to_string(), value.unwrap_or(Value::Null)));
    }
    Ok(Row::new(values))
}

#[async_trait]
impl Database for PgClient {
    async fn query(&self, sql: &str, params: &[Param<'_>]) -> Result<Vec<Row>> {
        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| Error::Query("connection has been closed".to_string()))?;

        let rows = client.query(sql, params).await?;
        rows.iter().map(decode).collect()
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| Error::Query("connection has been closed".to_string()))?;

        client.simple_query(sql).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = Row::new([
            ("current", Value::from(41i64)),
            ("called", Value::from(true)),
            ("name", Value::Null),
            ("columns", Value::from(vec!["id".to_string()])),
        ]);

        assert_eq!(row.get_i64("current").unwrap(), Some(41));
        assert_eq!(row.get_bool("called").unwrap(), Some(true));
        assert_eq!(row.get("name"), None);
        assert_eq!(row.get_array("columns").unwrap(), vec!["id".to_string()]);
        assert!(row.get_array("missing").unwrap().is_empty());
        assert!(row.require("name").is_err());
    }

    #[test]
    fn test_row_rejects_mismatched_types() {
        let row = Row::new([("current", Some("41"))]);
        assert!(row.get_i64("current").is_err());
        assert!(row.get_bool("current").is_err());
        assert_eq!(row.require("current").unwrap(), "41");
    }
}
