//! Session Configuration
//!
//! Settings for one terminal session: protocol version, server address,
//! credentials and the per-version client settings. The adapter reads a
//! snapshot of these at every connect and never mutates them.

use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Default terminal server (vendor demo endpoint).
pub const DEFAULT_SERVER_ADDRESS: &str = "mxdemo.ittrade.ru:8443";

// =============================================================================
// Protocol Version
// =============================================================================

/// Terminal client protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalVersion {
    /// Second-generation client (32-bit only).
    V2,
    /// Third-generation client.
    #[default]
    V3,
}

impl TerminalVersion {
    /// Get the version name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }

    /// Client binary variant this version can be loaded into.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        match self {
            Self::V3 => Platform::AnyCpu,
            Self::V2 => Platform::X86,
        }
    }
}

impl FromStr for TerminalVersion {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "v2" | "2" => Ok(Self::V2),
            "v3" | "3" => Ok(Self::V3),
            other => Err(SessionError::UnknownVersion(other.to_string())),
        }
    }
}

impl fmt::Display for TerminalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client binary variant a process must run as to load the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Loads in both 32-bit and 64-bit processes.
    AnyCpu,
    /// Requires a 32-bit process.
    X86,
}

/// Pointer width of a process hosting the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bitness {
    /// 32-bit process.
    X86,
    /// 64-bit process.
    X64,
}

impl Bitness {
    /// Bitness of the running process.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_pointer_width = "64") {
            Self::X64
        } else {
            Self::X86
        }
    }
}

// =============================================================================
// Server Address
// =============================================================================

/// Terminal server `host:port` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Create an address from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for ServerAddress {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| SessionError::InvalidAddress(trimmed.to_string()))?;

        if host.is_empty() {
            return Err(SessionError::InvalidAddress(trimmed.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| SessionError::InvalidAddress(trimmed.to_string()))?;

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Session Configuration
// =============================================================================

/// Settings for one terminal session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Client protocol version.
    pub version: TerminalVersion,
    /// Terminal server address.
    pub address: ServerAddress,
    /// Account login.
    pub login: String,
    password: String,
    /// Client-side settings string (V3 only).
    pub client_settings: Option<String>,
    /// Server-side settings string (V3 only).
    pub server_settings: Option<String>,
}

impl SessionConfig {
    /// Create a session configuration.
    #[must_use]
    pub fn new(
        version: TerminalVersion,
        address: ServerAddress,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            version,
            address,
            login: login.into(),
            password: password.into(),
            client_settings: None,
            server_settings: None,
        }
    }

    /// Attach V3 client and server settings.
    #[must_use]
    pub fn with_settings(
        mut self,
        client_settings: Option<String>,
        server_settings: Option<String>,
    ) -> Self {
        self.client_settings = client_settings;
        self.server_settings = server_settings;
        self
    }

    /// Account password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Platform selector, derived from the version.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.version.platform()
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("version", &self.version)
            .field("address", &self.address)
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("client_settings", &self.client_settings)
            .field("server_settings", &self.server_settings)
            .finish()
    }
}

/// Shared holder for the session configuration.
///
/// The owner may change the configuration between connection cycles; the
/// adapter only ever reads snapshots.
#[derive(Debug)]
pub struct SessionHolder {
    config: RwLock<SessionConfig>,
}

impl SessionHolder {
    /// Wrap a configuration.
    #[must_use]
    pub const fn new(config: SessionConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Immutable copy of the current configuration.
    #[must_use]
    pub fn snapshot(&self) -> SessionConfig {
        self.config.read().clone()
    }

    /// Current protocol version.
    #[must_use]
    pub fn version(&self) -> TerminalVersion {
        self.config.read().version
    }

    /// Platform selector for the current version.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.config.read().platform()
    }

    /// Switch the protocol version. Takes effect at the next connect.
    pub fn set_version(&self, version: TerminalVersion) {
        let mut config = self.config.write();
        if config.version != version {
            tracing::info!(from = %config.version, to = %version, "Terminal version changed");
            config.version = version;
        }
    }
}

/// Session configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Version string is not a known protocol version.
    #[error("unknown terminal version: {0}")]
    UnknownVersion(String),
    /// Address is not a valid `host:port` pair.
    #[error("invalid terminal address: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn config(version: TerminalVersion) -> SessionConfig {
        SessionConfig::new(
            version,
            ServerAddress::new("localhost", 8443),
            "trader",
            "hunter2",
        )
    }

    #[test_case("v2", TerminalVersion::V2 ; "lower v2")]
    #[test_case("V3", TerminalVersion::V3 ; "upper v3")]
    #[test_case(" 3 ", TerminalVersion::V3 ; "bare number")]
    fn version_parsing(input: &str, expected: TerminalVersion) {
        assert_eq!(input.parse::<TerminalVersion>().unwrap(), expected);
    }

    #[test]
    fn unknown_version_rejected() {
        assert_eq!(
            "v9".parse::<TerminalVersion>(),
            Err(SessionError::UnknownVersion("v9".to_string()))
        );
    }

    #[test]
    fn platform_follows_version() {
        assert_eq!(TerminalVersion::V3.platform(), Platform::AnyCpu);
        assert_eq!(TerminalVersion::V2.platform(), Platform::X86);
    }

    #[test]
    fn holder_platform_recomputed_on_version_change() {
        let holder = SessionHolder::new(config(TerminalVersion::V3));
        assert_eq!(holder.platform(), Platform::AnyCpu);

        holder.set_version(TerminalVersion::V2);
        assert_eq!(holder.platform(), Platform::X86);
        assert_eq!(holder.snapshot().platform(), Platform::X86);
    }

    #[test]
    fn address_parsing() {
        let address: ServerAddress = DEFAULT_SERVER_ADDRESS.parse().unwrap();
        assert_eq!(address.host(), "mxdemo.ittrade.ru");
        assert_eq!(address.port(), 8443);
        assert_eq!(address.to_string(), DEFAULT_SERVER_ADDRESS);
    }

    #[test_case("localhost" ; "missing port")]
    #[test_case(":8443" ; "missing host")]
    #[test_case("localhost:http" ; "non numeric port")]
    #[test_case("localhost:70000" ; "port out of range")]
    fn invalid_addresses(input: &str) {
        assert!(matches!(
            input.parse::<ServerAddress>(),
            Err(SessionError::InvalidAddress(_))
        ));
    }

    #[test]
    fn password_redacted_debug() {
        let debug = format!("{:?}", config(TerminalVersion::V3));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn snapshot_is_detached() {
        let holder = SessionHolder::new(config(TerminalVersion::V3));
        let before = holder.snapshot();
        holder.set_version(TerminalVersion::V2);
        assert_eq!(before.version, TerminalVersion::V3);
    }
}
