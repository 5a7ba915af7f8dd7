//! Environment variable and home directory expansion for config strings.

use crate::ConfigError;

/// Expand `${VAR}`, `$VAR` and a leading `~` in a configuration value.
///
/// `field` names the config key and only appears in the error message.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::full(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_unchanged() {
        assert_eq!(expand_env("php-cgi", "cgi.interpreter").unwrap(), "php-cgi");
    }

    #[test]
    fn test_expands_set_variable() {
        // PATH is set in every test environment we run in
        let path = std::env::var("PATH").unwrap();
        assert_eq!(expand_env("${PATH}", "site.root").unwrap(), path);
    }

    #[test]
    fn test_unset_variable_reports_field() {
        let err = expand_env("${LIVEPHP_SURELY_UNSET_VARIABLE}", "server.host").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("server.host"));
    }
}
