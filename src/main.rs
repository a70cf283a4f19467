//! pgconverge - converge a PostgreSQL database to its declared schema
//!
//! Loads settings and schema documents, runs one synchronization and prints
//! the statements it executed.

use pgconverge::config::Settings;
use pgconverge::db::PgClient;
use pgconverge::{loader, Engine};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    let settings = Settings::load()?;
    info!(
        schema_paths = settings.engine.schema_paths.len(),
        default_schema = %settings.engine.default_schema,
        "Configuration loaded"
    );

    let documents = loader::load_documents(&settings.engine.schema_paths)?;
    let client = Arc::new(PgClient::connect(&settings.database).await?);

    let mut engine = Engine::new(client.clone()).with_default_schema(&settings.engine.default_schema);
    let result = async {
        for document in documents {
            engine.register(document)?;
        }
        engine.sync(&settings.engine.sync).await
    }
    .await;

    client.end().await;

    match result {
        Ok(report) => {
            for query in &report.queries {
                println!("{};", query);
            }
            info!(statements = report.queries.len(), "Done");
            Ok(())
        }
        Err(e) => {
            error!("Synchronization failed: {}", e);
            Err(e.into())
        }
    }
}

/// Initialize tracing with environment-based filtering
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pgconverge=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}
