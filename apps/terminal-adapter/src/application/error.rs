//! Adapter errors surfaced synchronously to the host.
//!
//! These are local precondition violations or synchronous client call
//! failures. They are never retried by the adapter. Asynchronous terminal
//! failures are not errors here; they become outbound messages.

use crate::application::ports::ClientError;
use crate::application::services::factory::ClientTarget;
use crate::domain::session::TerminalVersion;

/// Error returned by inbound operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// Connect issued while a client handle exists.
    #[error("terminal session already connected")]
    AlreadyConnected,

    /// Operation issued while no client handle exists.
    #[error("terminal session not connected")]
    NotConnected,

    /// No client can be built for the requested version.
    #[error("unsupported terminal version {version} (target {target})")]
    UnsupportedVersion {
        /// Requested protocol version.
        version: TerminalVersion,
        /// Resolved client binary variant.
        target: ClientTarget,
    },

    /// A synchronous client call failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl AdapterError {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyConnected => "already_connected",
            Self::NotConnected => "not_connected",
            Self::UnsupportedVersion { .. } => "unsupported_version",
            Self::Client(_) => "client",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(AdapterError::AlreadyConnected.as_str(), "already_connected");
        assert_eq!(AdapterError::NotConnected.as_str(), "not_connected");
        assert_eq!(
            AdapterError::from(ClientError::NotConnected).as_str(),
            "client"
        );
    }

    #[test]
    fn unsupported_version_message() {
        let err = AdapterError::UnsupportedVersion {
            version: TerminalVersion::V2,
            target: ClientTarget::V2X86,
        };
        assert_eq!(
            err.to_string(),
            "unsupported terminal version v2 (target v2-x86)"
        );
    }
}
