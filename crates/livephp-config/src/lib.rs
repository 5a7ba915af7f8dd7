//! Configuration management for livephp.
//!
//! Parses `livephp.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories. Every setting has a
//! default, so running without any config file is the common case.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! These string values support `${VAR}` expansion and a leading `~`:
//! - `server.host`
//! - `site.root`
//! - `cgi.interpreter`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override the served root directory.
    pub root: Option<PathBuf>,
    /// Override the CGI interpreter program.
    pub interpreter: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "livephp.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Served tree configuration (root is a relative string from TOML).
    site: SiteConfigRaw,
    /// CGI interpreter configuration.
    pub cgi: CgiConfig,

    /// Resolved site configuration (set after loading).
    #[serde(skip)]
    pub site_resolved: SiteConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 9000,
        }
    }
}

/// Raw site configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SiteConfigRaw {
    root: Option<String>,
}

/// Resolved site configuration with an absolute-or-base-relative root.
#[derive(Debug, Default)]
pub struct SiteConfig {
    /// Directory tree exposed by the server.
    pub root: PathBuf,
}

/// CGI interpreter configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CgiConfig {
    /// Interpreter program, looked up on `PATH` when not absolute.
    pub interpreter: String,
    /// Extra arguments passed to the interpreter before any request data.
    pub args: Vec<String>,
    /// Value of `SERVER_NAME` handed to scripts.
    pub server_name: String,
}

impl Default for CgiConfig {
    fn default() -> Self {
        Self {
            interpreter: "php-cgi".to_owned(),
            args: Vec::new(),
            server_name: "localhost".to_owned(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`site.root`").
        field: String,
        /// Error message from the expander.
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `livephp.toml` in current directory and parents,
    /// falling back to defaults rooted at the current directory.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the final configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(root) = &settings.root {
            self.site_resolved.root.clone_from(root);
        }
        if let Some(interpreter) = &settings.interpreter {
            self.cgi.interpreter.clone_from(interpreter);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            site: SiteConfigRaw::default(),
            cgi: CgiConfig::default(),
            site_resolved: SiteConfig {
                root: base.to_path_buf(),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        config.resolve_paths(config_dir(path));
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 would bind a random port nobody can find in the browser
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        require_non_empty(&self.cgi.interpreter, "cgi.interpreter")?;
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;
        self.cgi.interpreter = expand::expand_env(&self.cgi.interpreter, "cgi.interpreter")?;

        if let Some(root) = &self.site.root {
            self.site.root = Some(expand::expand_env(root, "site.root")?);
        }

        Ok(())
    }

    /// Resolve the site root relative to the config file directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let root = self.site.root.as_deref().unwrap_or(".");
        self.site_resolved = SiteConfig {
            root: if root == "." {
                config_dir.to_path_buf()
            } else {
                config_dir.join(root)
            },
        };
    }
}

/// Directory containing `path`; `.` for a bare file name.
fn config_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.site_resolved.root, PathBuf::from("/test"));
        assert_eq!(config.cgi.interpreter, "php-cgi");
        assert!(config.cgi.args.is_empty());
        assert_eq!(config.cgi.server_name, "localhost");
        assert!(config.config_path.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.cgi.interpreter, "php-cgi");
    }

    #[test]
    fn test_parse_server_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 8080
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_parse_cgi_config() {
        let toml = r#"
[cgi]
interpreter = "/usr/bin/php-cgi8.3"
args = ["-d", "display_errors=1"]
server_name = "dev.local"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cgi.interpreter, "/usr/bin/php-cgi8.3");
        assert_eq!(config.cgi.args, vec!["-d".to_owned(), "display_errors=1".to_owned()]);
        assert_eq!(config.cgi.server_name, "dev.local");
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[site]
root = "public"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.site_resolved.root, PathBuf::from("/project/public"));
    }

    #[test]
    fn test_resolve_paths_defaults_to_config_dir() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.site_resolved.root, PathBuf::from("/project"));
    }

    #[test]
    fn test_config_dir_of_bare_file_name() {
        assert_eq!(config_dir(Path::new("livephp.toml")), Path::new("."));
        assert_eq!(config_dir(Path::new("site/livephp.toml")), Path::new("site"));
        assert_eq!(config_dir(Path::new("/srv/livephp.toml")), Path::new("/srv"));
    }

    #[test]
    fn test_resolve_paths_for_bare_config_file_name() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve_paths(config_dir(Path::new(CONFIG_FILENAME)));

        assert_eq!(config.site_resolved.root, PathBuf::from("."));
        assert!(config.site_resolved.root.canonicalize().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
[server]
port = 9100

[site]
root = "www"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.site_resolved.root, dir.path().join("www"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = Config::load(Some(Path::new("/nonexistent/livephp.toml")), None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[server\nport = ").unwrap();

        let result = Config::load(Some(&path), None);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_port_zero() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.server.port = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_validate_rejects_empty_interpreter() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.cgi.interpreter = "  ".to_owned();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cgi.interpreter"));
    }

    #[test]
    fn test_apply_cli_settings_host() {
        let mut config = Config::default_with_base(Path::new("/test"));

        let overrides = CliSettings {
            host: Some("0.0.0.0".to_owned()),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_root_and_interpreter() {
        let mut config = Config::default_with_base(Path::new("/test"));

        let overrides = CliSettings {
            root: Some(PathBuf::from("/srv/site")),
            interpreter: Some("php-cgi8.2".to_owned()),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.site_resolved.root, PathBuf::from("/srv/site"));
        assert_eq!(config.cgi.interpreter, "php-cgi8.2");
        assert_eq!(config.server.host, "127.0.0.1"); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));

        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.site_resolved.root, PathBuf::from("/test"));
        assert_eq!(config.cgi.interpreter, "php-cgi");
    }
}
