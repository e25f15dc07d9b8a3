//! Outbound Pipe Port (Driven Port)
//!
//! The host supplies the pipe outbound messages are written into.

use crate::domain::messages::OutMessage;

/// Host-supplied outbound message pipe.
///
/// Called synchronously, possibly from terminal client threads, so
/// implementations must not block. No adapter lock is held during the call:
/// an implementation may feed inbound messages back into the adapter, for
/// example a lookup as soon as it sees `Connect`.
pub trait OutboundSink: Send + Sync {
    /// Emit one message.
    fn send_out(&self, message: OutMessage);
}
