//! Message Bus Module
//!
//! Host-side plumbing for the adapter's message pipes.
//!
//! - **Inbound**: one JSON object per line, tagged by `type`
//! - **Outbound**: [`ChannelSink`] forwards every message into an unbounded
//!   tokio channel; a writer task encodes them as JSON lines
//!
//! # Wire Format
//!
//! ```json
//! {"type":"connect"}
//! {"type":"market_data","transaction_id":3,"security_id":"SBER","data_type":{"kind":"level1"},"is_subscribe":true}
//! ```

use tokio::sync::mpsc;

use crate::application::ports::OutboundSink;
use crate::domain::messages::{InMessage, OutMessage};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Line is not a JSON object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// JSON lines codec for bus messages.
#[derive(Debug, Default, Clone)]
pub struct JsonLineCodec;

impl JsonLineCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one inbound line. Blank lines decode to `None`.
    ///
    /// Objects with an unknown `type` decode to [`InMessage::Unsupported`].
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a JSON object or a known message
    /// has malformed fields.
    pub fn decode(&self, line: &str) -> Result<Option<InMessage>, BusError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        if !trimmed.starts_with('{') {
            return Err(BusError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                trimmed.chars().take(50).collect::<String>()
            )));
        }

        Ok(Some(serde_json::from_str(trimmed)?))
    }

    /// Encode one outbound message as a single line (no trailing newline).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self, message: &OutMessage) -> Result<String, BusError> {
        Ok(serde_json::to_string(message)?)
    }
}

/// Outbound pipe backed by an unbounded tokio channel.
///
/// Sending never blocks, so it is safe to call from terminal client threads.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutMessage>,
}

impl ChannelSink {
    /// Wrap an existing sender.
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<OutMessage>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver it feeds.
    #[must_use]
    pub fn unbounded() -> (Self, mpsc::UnboundedReceiver<OutMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Whether the receiving side is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl OutboundSink for ChannelSink {
    fn send_out(&self, message: OutMessage) {
        if let Err(e) = self.tx.send(message) {
            tracing::warn!(
                kind = e.0.kind().as_str(),
                "Outbound receiver dropped, message discarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::messages::InMessageKind;

    #[test]
    fn decode_blank_line() {
        let codec = JsonLineCodec::new();
        assert!(codec.decode("   ").unwrap().is_none());
    }

    #[test]
    fn decode_connect() {
        let codec = JsonLineCodec::new();
        let msg = codec.decode(r#"{"type":"connect"}"#).unwrap().unwrap();
        assert_eq!(msg.kind(), InMessageKind::Connect);
    }

    #[test]
    fn decode_unknown_type_is_unsupported() {
        let codec = JsonLineCodec::new();
        let msg = codec.decode(r#"{"type":"order_status"}"#).unwrap().unwrap();
        assert_eq!(msg, InMessage::Unsupported);
    }

    #[test]
    fn decode_rejects_non_object() {
        let codec = JsonLineCodec::new();
        assert!(matches!(
            codec.decode("[1,2,3]"),
            Err(BusError::InvalidFormat(_))
        ));
        assert!(matches!(
            codec.decode("{not json"),
            Err(BusError::Json(_))
        ));
    }

    #[test]
    fn encode_is_single_line() {
        let codec = JsonLineCodec::new();
        let line = codec
            .encode(&OutMessage::Disconnect {
                error: Some("line\nbreak".to_string()),
            })
            .unwrap();
        assert!(!line.contains('\n'));
        assert!(line.starts_with(r#"{"type":"disconnect""#));
    }

    #[test]
    fn channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::unbounded();
        sink.send_out(OutMessage::Connect);
        assert_eq!(rx.try_recv().ok(), Some(OutMessage::Connect));
    }

    #[test]
    fn channel_sink_survives_closed_receiver() {
        let (sink, rx) = ChannelSink::unbounded();
        drop(rx);
        assert!(sink.is_closed());
        sink.send_out(OutMessage::Connect);
    }
}
