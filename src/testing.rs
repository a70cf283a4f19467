//! Test doubles for the database and introspector collaborators

use crate::db::{Database, Param, Row};
use crate::error::{Error, Result};
use crate::introspection::{IntrospectionRequest, Introspector, Observed};
use async_trait::async_trait;
use std::sync::Mutex;

struct Response {
    fragment: String,
    parameter: Option<String>,
    rows: Vec<Row>,
}

/// Database answering from scripted responses. Every statement is recorded
/// with its bound parameters. The first response whose fragment occurs in the
/// SQL (and whose parameter, if any, occurs in a bound value) wins; anything
/// else returns no rows.
#[derive(Default)]
pub struct MockDatabase {
    responses: Vec<Response>,
    failures: Vec<String>,
    statements: Mutex<Vec<(String, Vec<String>)>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, fragment: impl Into<String>, rows: Vec<Row>) -> Self {
        self.responses.push(Response {
            fragment: fragment.into(),
            parameter: None,
            rows,
        });
        self
    }

    /// Respond only when some bound parameter contains `parameter`
    pub fn respond_with(
        mut self,
        fragment: impl Into<String>,
        parameter: impl Into<String>,
        rows: Vec<Row>,
    ) -> Self {
        self.responses.push(Response {
            fragment: fragment.into(),
            parameter: Some(parameter.into()),
            rows,
        });
        self
    }

    /// Fail any statement containing `fragment`
    pub fn fail_on(mut self, fragment: impl Into<String>) -> Self {
        self.failures.push(fragment.into());
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    /// Bound parameters of the first statement containing `fragment`, as
    /// unquoted debug text
    pub fn parameters(&self, fragment: &str) -> Option<Vec<String>> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .find(|(sql, _)| sql.contains(fragment))
            .map(|(_, params)| params.clone())
    }

    fn record(&self, sql: &str, params: Vec<String>) -> Result<()> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params));

        match self.failures.iter().find(|f| sql.contains(f.as_str())) {
            Some(fragment) => Err(Error::Query(format!("scripted failure on `{}`", fragment))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn query(&self, sql: &str, params: &[Param<'_>]) -> Result<Vec<Row>> {
        let params: Vec<String> = params
            .iter()
            .map(|p| {
                let debug = format!("{:?}", p);
                let unquoted = debug.strip_prefix('"').unwrap_or(&debug);
                let unquoted = unquoted.strip_suffix('"').unwrap_or(unquoted);
                unquoted.replace("\\\"", "\"")
            })
            .collect();
        self.record(sql, params.clone())?;

        Ok(self
            .responses
            .iter()
            .find(|r| {
                sql.contains(r.fragment.as_str())
                    && r
                        .parameter
                        .as_ref()
                        .map_or(true, |wanted| params.iter().any(|p| p.contains(wanted.as_str())))
            })
            .map(|r| r.rows.clone())
            .unwrap_or_default())
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.record(sql, Vec::new())
    }
}

/// Introspector returning a fixed observation
#[derive(Debug, Clone, Default)]
pub struct StaticIntrospector(pub Observed);

#[async_trait]
impl Introspector for StaticIntrospector {
    async fn find(&self, _db: &dyn Database, _request: &IntrospectionRequest) -> Result<Observed> {
        Ok(self.0.clone())
    }
}
