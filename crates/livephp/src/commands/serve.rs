//! `livephp serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use livephp_config::{CliSettings, Config};
use livephp_server::{run_server, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover livephp.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project directory to serve (overrides config).
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// CGI interpreter program (overrides config).
    #[arg(long, env = "LIVEPHP_INTERPRETER")]
    interpreter: Option<String>,

    /// Enable verbose output (debug logs for watched directories and scripts).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            root: self.dir,
            interpreter: self.interpreter,
        };

        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::debug!(path = %path.display(), "Loaded configuration");
        }

        output.listening(&config.server.host, config.server.port);
        output.field("Project directory", config.site_resolved.root.display());
        output.field("Interpreter", &config.cgi.interpreter);
        output.note("Live reload: pages reload when .php, .html, .css or .js files change");

        let server_config = server_config_from_config(&config, version.to_owned());
        run_server(server_config)
            .await
            .map_err(|e| CliError::Server(e.to_string()))?;

        Ok(())
    }
}
