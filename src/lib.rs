//! pgconverge - Declarative PostgreSQL schema reconciliation
//!
//! Describe tables and sequences once; each [`Engine::sync`] call compares
//! the declared schema with the live database and applies the minimal, safe
//! sequence of statements needed to converge, inside a transaction.
//!
//! ```no_run
//! # async fn run() -> pgconverge::Result<()> {
//! use pgconverge::{config::Settings, db::PgClient, loader, Engine};
//! use std::sync::Arc;
//!
//! let settings = Settings::load()?;
//! let client = Arc::new(PgClient::connect(&settings.database).await?);
//! let mut engine = Engine::new(client.clone());
//! for document in loader::load_documents(&settings.engine.schema_paths)? {
//!     engine.register(document)?;
//! }
//! let report = engine.sync(&settings.engine.sync).await?;
//! println!("{} statements", report.queries.len());
//! client.end().await;
//! # Ok(())
//! # }
//! ```

pub mod changeset;
pub mod config;
pub mod db;
pub mod definition;
pub mod error;
pub mod introspection;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use pipeline::{AllowClean, Engine, SyncOptions, SyncReport};
