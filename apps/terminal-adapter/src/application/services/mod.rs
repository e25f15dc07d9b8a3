//! Application Services
//!
//! - `factory`: builds a client per connect attempt, keyed by version and bitness
//! - `lifecycle`: connection state machine and scoped event binding
//! - `dispatcher`: inbound message routing
//! - `translator`: client event to outbound message translation
//! - `adapter`: the facade tying them together

mod adapter;
mod dispatcher;
pub mod factory;
pub mod lifecycle;
pub mod translator;

pub use adapter::{AdapterCapabilities, TerminalAdapter};
pub use factory::{ClientFactory, ClientTarget, VersionedClientFactory};
pub use lifecycle::{ConnectionController, ConnectionState, CycleId, EventBinding, EventOutcome};
pub use translator::{CycleCaches, OutboundTranslator, LOOKUP_IN_PROGRESS};
