//! Waybook server binary
//!
//! HTTP delivery server for workbook progression and history.
//!
//! ## Usage
//!
//! ```bash
//! waybook-server [--port PORT] [--db PATH] [--published-part N]
//! ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use waybook_engine::{EngineConfig, IdentityCodec, WorkbookDb};
use waybook_server::{router, AppState, DEFAULT_HTTP_PORT};

const DEFAULT_DB_PATH: &str = "waybook.db";

fn print_usage() {
    eprintln!(
        r#"waybook-server - HTTP delivery server for workbook progression

USAGE:
    waybook-server [OPTIONS]

OPTIONS:
    --port <PORT>             HTTP port (default: {port})
    --db <PATH>               SQLite database path (default: {db})
    --published-part <N>      Highest published curriculum part (default: 2)
    --help, -h                Show this help

EXAMPLES:
    waybook-server                            # Serve {db} on port {port}
    waybook-server --port 3000 --db dev.db
"#,
        port = DEFAULT_HTTP_PORT,
        db = DEFAULT_DB_PATH,
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut port = DEFAULT_HTTP_PORT;
    let mut db_path = DEFAULT_DB_PATH.to_string();
    let mut cfg = EngineConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "--port" => match args.get(i + 1).and_then(|s| s.parse().ok()) {
                Some(p) => {
                    port = p;
                    i += 2;
                }
                None => {
                    eprintln!("--port requires a number");
                    return ExitCode::FAILURE;
                }
            },
            "--db" => match args.get(i + 1) {
                Some(path) => {
                    db_path = path.clone();
                    i += 2;
                }
                None => {
                    eprintln!("--db requires a path");
                    return ExitCode::FAILURE;
                }
            },
            "--published-part" => match args.get(i + 1).and_then(|s| s.parse().ok()) {
                Some(part) => {
                    cfg.published_max_part = part;
                    i += 2;
                }
                None => {
                    eprintln!("--published-part requires a number");
                    return ExitCode::FAILURE;
                }
            },
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                return ExitCode::FAILURE;
            }
        }
    }

    run_server(port, &db_path, cfg).await
}

async fn run_server(port: u16, db_path: &str, cfg: EngineConfig) -> ExitCode {
    tracing::info!("Starting waybook server on port {} (db: {})", port, db_path);

    let db = match WorkbookDb::open(db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open database {}: {}", db_path, e);
            return ExitCode::FAILURE;
        }
    };

    if !cfg.sensitive_tool_ids.is_empty() {
        // IdentityCodec stores sensitive text as-is. Deployments with a
        // sensitive set must wire a real codec here.
        tracing::warn!("sensitive tool ids configured without a PII backend");
    }

    let state = AppState::new(db, cfg, Arc::new(IdentityCodec));
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind port {}: {}", port, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
