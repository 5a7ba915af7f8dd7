//! Live-reload development server for PHP projects.
//!
//! This crate serves one project directory over HTTP:
//! - `.php` files run through a CGI interpreter (`php-cgi`), one process
//!   per request
//! - HTML pages and script output get a small live-reload client injected
//! - everything else is served as static files
//!
//! A recursive file watcher pushes a reload signal to every open browser
//! tab over `GET /events` whenever a PHP, HTML, CSS or JS file changes.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use livephp_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         root: PathBuf::from("site"),
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum server (livephp-server)
//!                        │
//!                        ├─► /events (SSE) ◄── NotificationHub ◄── TreeWatcher ◄── notify
//!                        │
//!                        ├─► *.php ──► livephp-cgi ──► php-cgi process
//!                        │
//!                        ├─► *.html ──► read + inject
//!                        │
//!                        └─► other files (tower-http ServeFile)
//! ```

mod app;
mod error;
mod handlers;
mod live_reload;
mod path_guard;
mod state;
mod static_files;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use livephp_cgi::{Interpreter, ServerIdentity};
use live_reload::{NotificationHub, TreeWatcher};
use path_guard::ServeRoot;
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory to serve.
    pub root: PathBuf,
    /// CGI interpreter program.
    pub interpreter: String,
    /// Extra interpreter arguments.
    pub interpreter_args: Vec<String>,
    /// `SERVER_NAME` exposed to scripts.
    pub server_name: String,
    /// Application version (reported as `SERVER_SOFTWARE`).
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 9000,
            root: PathBuf::from("."),
            interpreter: "php-cgi".to_owned(),
            interpreter_args: Vec::new(),
            server_name: "localhost".to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// Run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the root directory cannot be resolved, the file
/// watcher cannot be started, or the listener cannot be bound.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let root = ServeRoot::new(&config.root).map_err(|e| {
        format!("Cannot serve directory {}: {e}", config.root.display())
    })?;

    // No server without a working watcher
    let hub = NotificationHub::new();
    let watcher = TreeWatcher::start(root.path(), hub.clone())?;

    let identity = ServerIdentity {
        software: format!("livephp/{}", config.version),
        ..ServerIdentity::new(config.server_name.clone(), config.port)
    };
    let interpreter =
        Interpreter::new(&config.interpreter, identity).with_args(config.interpreter_args.clone());

    let state = Arc::new(AppState {
        root,
        interpreter,
        hub: hub.clone(),
    });
    let app = app::create_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(address = %listener.local_addr()?, "Starting server");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(hub))
    .await?;

    watcher.shutdown().await;
    Ok(())
}

/// Wait for shutdown signal (Ctrl-C), then end all event streams.
async fn shutdown_signal(hub: NotificationHub) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!(
        clients = hub.subscriber_count(),
        "Shutdown signal received, stopping server..."
    );
    hub.close();
}

/// Create server configuration from livephp config.
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `version` - Application version
#[must_use]
pub fn server_config_from_config(config: &livephp_config::Config, version: String) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root: config.site_resolved.root.clone(),
        interpreter: config.cgi.interpreter.clone(),
        interpreter_args: config.cgi.args.clone(),
        server_name: config.cgi.server_name.clone(),
        version,
    }
}
