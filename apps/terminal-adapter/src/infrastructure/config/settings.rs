//! Adapter Configuration Settings
//!
//! Configuration for the adapter service, loaded from environment variables.

use std::time::Duration;

use crate::domain::session::{
    DEFAULT_SERVER_ADDRESS, ServerAddress, SessionConfig, SessionError, TerminalVersion,
};

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Host-side connection supervision.
#[derive(Debug, Clone, Default)]
pub struct WatchdogSettings {
    /// How long a connect may stay pending before the host disconnects
    /// (`None` = wait forever).
    pub connect_timeout: Option<Duration>,
}

/// Complete adapter configuration.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Terminal session settings (credentials redacted in `Debug`).
    pub session: SessionConfig,
    /// Server port settings.
    pub server: ServerSettings,
    /// Connection supervision.
    pub watchdog: WatchdogSettings,
}

impl AdapterConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing or empty, or if the
    /// version or address cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`AdapterConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let login = required(&lookup, "TERMINAL_LOGIN")?;
        let password = required(&lookup, "TERMINAL_PASSWORD")?;

        let version = lookup("TERMINAL_VERSION")
            .map(|s| s.parse::<TerminalVersion>())
            .transpose()?
            .unwrap_or_default();

        let address = lookup("TERMINAL_ADDRESS")
            .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string())
            .parse::<ServerAddress>()?;

        let session = SessionConfig::new(version, address, login, password).with_settings(
            optional(&lookup, "TERMINAL_CLIENT_SETTINGS"),
            optional(&lookup, "TERMINAL_SERVER_SETTINGS"),
        );

        let server = ServerSettings {
            health_port: parse_u16(
                &lookup,
                "ADAPTER_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        let timeout_secs = parse_u64(&lookup, "ADAPTER_CONNECT_TIMEOUT_SECS", 0);
        let watchdog = WatchdogSettings {
            connect_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        };

        Ok(Self {
            session,
            server,
            watchdog,
        })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an empty value.
    #[error("environment variable {0} has empty value")]
    EmptyValue(String),

    /// Environment variable could not be parsed.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] SessionError),
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.is_empty())
}

fn parse_u16<F>(lookup: &F, key: &str, default: u16) -> u16
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AdapterConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AdapterConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_with_credentials_only() {
        let config = load(&[("TERMINAL_LOGIN", "trader"), ("TERMINAL_PASSWORD", "pw")]).unwrap();

        assert_eq!(config.session.version, TerminalVersion::V3);
        assert_eq!(config.session.address.to_string(), DEFAULT_SERVER_ADDRESS);
        assert_eq!(config.session.login, "trader");
        assert_eq!(config.session.password(), "pw");
        assert_eq!(config.server.health_port, 8083);
        assert!(config.watchdog.connect_timeout.is_none());
    }

    #[test]
    fn missing_login() {
        let err = load(&[("TERMINAL_PASSWORD", "pw")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "TERMINAL_LOGIN"));
    }

    #[test]
    fn empty_password() {
        let err = load(&[("TERMINAL_LOGIN", "trader"), ("TERMINAL_PASSWORD", "")]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(ref k) if k == "TERMINAL_PASSWORD"));
    }

    #[test]
    fn explicit_values() {
        let config = load(&[
            ("TERMINAL_LOGIN", "trader"),
            ("TERMINAL_PASSWORD", "pw"),
            ("TERMINAL_VERSION", "v2"),
            ("TERMINAL_ADDRESS", "10.0.0.5:8090"),
            ("TERMINAL_CLIENT_SETTINGS", "logLevel=5"),
            ("ADAPTER_HEALTH_PORT", "9100"),
            ("ADAPTER_CONNECT_TIMEOUT_SECS", "15"),
        ])
        .unwrap();

        assert_eq!(config.session.version, TerminalVersion::V2);
        assert_eq!(config.session.address.host(), "10.0.0.5");
        assert_eq!(config.session.address.port(), 8090);
        assert_eq!(config.session.client_settings.as_deref(), Some("logLevel=5"));
        assert_eq!(config.session.server_settings, None);
        assert_eq!(config.server.health_port, 9100);
        assert_eq!(config.watchdog.connect_timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn invalid_version() {
        let err = load(&[
            ("TERMINAL_LOGIN", "trader"),
            ("TERMINAL_PASSWORD", "pw"),
            ("TERMINAL_VERSION", "v9"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(SessionError::UnknownVersion(_))));
    }

    #[test]
    fn unparsable_port_falls_back() {
        let config = load(&[
            ("TERMINAL_LOGIN", "trader"),
            ("TERMINAL_PASSWORD", "pw"),
            ("ADAPTER_HEALTH_PORT", "not-a-port"),
        ])
        .unwrap();
        assert_eq!(config.server.health_port, 8083);
    }

    #[test]
    fn password_redacted_in_debug() {
        let config = load(&[
            ("TERMINAL_LOGIN", "trader"),
            ("TERMINAL_PASSWORD", "hunter2"),
        ])
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
