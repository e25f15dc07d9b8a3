//! Client Factory
//!
//! Builds a fresh terminal client for every connect attempt. The concrete
//! client binary is selected by protocol version and process bitness; each
//! variant is a registered builder, so version checks live here only.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::application::error::AdapterError;
use crate::application::ports::TerminalClient;
use crate::domain::session::{Bitness, SessionConfig, TerminalVersion};

/// Concrete client binary variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientTarget {
    /// Version 2 client, 32-bit only.
    V2X86,
    /// Version 3 client loaded into a 32-bit process.
    V3X86,
    /// Version 3 client loaded into a 64-bit process.
    V3X64,
}

impl ClientTarget {
    /// Variant to load for `version` in a process of `bitness`.
    #[must_use]
    pub const fn resolve(version: TerminalVersion, bitness: Bitness) -> Self {
        match (version, bitness) {
            (TerminalVersion::V2, _) => Self::V2X86,
            (TerminalVersion::V3, Bitness::X64) => Self::V3X64,
            (TerminalVersion::V3, Bitness::X86) => Self::V3X86,
        }
    }

    /// Variant name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::V2X86 => "v2-x86",
            Self::V3X86 => "v3-x86",
            Self::V3X64 => "v3-x64",
        }
    }
}

impl fmt::Display for ClientTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces one not-yet-connected client per call.
pub trait ClientFactory: Send + Sync {
    /// Build a client configured from `session`.
    ///
    /// Must not start any network activity.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnsupportedVersion`] when no client can be
    /// built for the session's version.
    fn create(&self, session: &SessionConfig) -> Result<Arc<dyn TerminalClient>, AdapterError>;
}

type ClientBuilder = Box<dyn Fn(&SessionConfig) -> Arc<dyn TerminalClient> + Send + Sync>;

/// Factory keyed by [`ClientTarget`].
pub struct VersionedClientFactory {
    bitness: Bitness,
    builders: HashMap<ClientTarget, ClientBuilder>,
}

impl VersionedClientFactory {
    /// Empty factory for the running process.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bitness(Bitness::current())
    }

    /// Empty factory for a process of the given bitness.
    #[must_use]
    pub fn with_bitness(bitness: Bitness) -> Self {
        Self {
            bitness,
            builders: HashMap::new(),
        }
    }

    /// Register the builder for `target`.
    #[must_use]
    pub fn with_builder<F>(mut self, target: ClientTarget, builder: F) -> Self
    where
        F: Fn(&SessionConfig) -> Arc<dyn TerminalClient> + Send + Sync + 'static,
    {
        self.register(target, builder);
        self
    }

    /// Register the builder for `target`, replacing any previous one.
    pub fn register<F>(&mut self, target: ClientTarget, builder: F)
    where
        F: Fn(&SessionConfig) -> Arc<dyn TerminalClient> + Send + Sync + 'static,
    {
        self.builders.insert(target, Box::new(builder));
    }

    /// Process bitness this factory resolves targets for.
    #[must_use]
    pub const fn bitness(&self) -> Bitness {
        self.bitness
    }

    /// Whether a client can be built for `version`.
    #[must_use]
    pub fn supports(&self, version: TerminalVersion) -> bool {
        self.builders
            .contains_key(&ClientTarget::resolve(version, self.bitness))
    }
}

impl Default for VersionedClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VersionedClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedClientFactory")
            .field("bitness", &self.bitness)
            .field("targets", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ClientFactory for VersionedClientFactory {
    fn create(&self, session: &SessionConfig) -> Result<Arc<dyn TerminalClient>, AdapterError> {
        let target = ClientTarget::resolve(session.version, self.bitness);
        let builder = self
            .builders
            .get(&target)
            .ok_or(AdapterError::UnsupportedVersion {
                version: session.version,
                target,
            })?;

        tracing::debug!(
            version = %session.version,
            target = %target,
            "Building terminal client"
        );
        Ok(builder(session))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use test_case::test_case;

    use super::*;
    use crate::domain::session::ServerAddress;
    use crate::infrastructure::loopback::LoopbackClient;

    fn session(version: TerminalVersion) -> SessionConfig {
        SessionConfig::new(version, ServerAddress::new("localhost", 8443), "u", "p")
            .with_settings(Some("logLevel=1".to_string()), None)
    }

    #[test_case(TerminalVersion::V2, Bitness::X86, ClientTarget::V2X86 ; "v2 on x86")]
    #[test_case(TerminalVersion::V2, Bitness::X64, ClientTarget::V2X86 ; "v2 on x64")]
    #[test_case(TerminalVersion::V3, Bitness::X86, ClientTarget::V3X86 ; "v3 on x86")]
    #[test_case(TerminalVersion::V3, Bitness::X64, ClientTarget::V3X64 ; "v3 on x64")]
    fn target_resolution(version: TerminalVersion, bitness: Bitness, expected: ClientTarget) {
        assert_eq!(ClientTarget::resolve(version, bitness), expected);
    }

    #[test]
    fn missing_builder_is_unsupported() {
        let factory = VersionedClientFactory::with_bitness(Bitness::X64)
            .with_builder(ClientTarget::V3X64, |_| Arc::new(LoopbackClient::manual()));

        let err = factory.create(&session(TerminalVersion::V2)).err();
        assert_eq!(
            err,
            Some(AdapterError::UnsupportedVersion {
                version: TerminalVersion::V2,
                target: ClientTarget::V2X86,
            })
        );
        assert!(factory.supports(TerminalVersion::V3));
        assert!(!factory.supports(TerminalVersion::V2));
    }

    #[test]
    fn builds_fresh_client_per_call() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let factory = VersionedClientFactory::with_bitness(Bitness::X86).with_builder(
            ClientTarget::V3X86,
            move |session| {
                counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(session.client_settings.as_deref(), Some("logLevel=1"));
                Arc::new(LoopbackClient::manual())
            },
        );

        let first = factory.create(&session(TerminalVersion::V3)).unwrap();
        let second = factory.create(&session(TerminalVersion::V3)).unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
