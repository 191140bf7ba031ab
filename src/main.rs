//! SQL guard entry point.
//!
//! Reads one JSON request per line from stdin and writes one JSON verdict
//! per line to stdout:
//!
//! ```text
//! -> {"id": 1, "sql": "SELECT * FROM orders"}
//! <- {"id": 1, "verdict": {"is_valid": true, "message": "", "suggestions": []}}
//! ```
//!
//! Stops on end of input or Ctrl+C.

use anyhow::Result;
use sql_guard::schema::start_schema_refresh;
use sql_guard::{GuardConfig, GuardService};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout carries the responses)
    init_logging();

    let version = env!("CARGO_PKG_VERSION");
    info!("SQL guard v{} starting", version);

    let config = GuardConfig::from_env()?;
    let service = GuardService::new(&config)?;

    let refresher = match &config.schema.file {
        Some(path) => {
            start_schema_refresh(
                service.schema().clone(),
                path.clone(),
                config.schema.refresh_interval,
            )
            .await?
        }
        None => {
            warn!("No schema file configured, schema conformance checks are disabled");
            None
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    info!("Ready to accept requests on stdin");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("End of input");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match service.handle_line(&line) {
                    Ok(response) => {
                        stdout.write_all(response.as_bytes()).await?;
                        stdout.write_all(b"\n").await?;
                        stdout.flush().await?;
                    }
                    Err(e) => error!("Failed to write response: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    if let Some(task) = refresher {
        task.abort();
    }

    let metrics = service.metrics();
    info!(
        "Validated {} queries ({} rejected)",
        metrics.validations_total, metrics.validations_rejected
    );

    Ok(())
}

/// Initialize tracing subscriber with stderr output.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,sql_guard=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
