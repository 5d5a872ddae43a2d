//! Newline-delimited JSON envelope codec.
//!
//! One socket message may carry several envelopes separated by `\n`. Each line
//! decodes independently: a malformed line yields a [`ProtocolError`] and is
//! skipped without affecting its siblings. Blank lines are ignored.

use crate::envelope::{Envelope, EnvelopeType};
use crate::errors::{ProtocolError, SendError};

/// Result of decoding one socket message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedFrame {
    /// Envelopes in textual order.
    pub envelopes: Vec<Envelope>,
    /// One entry per line that failed to decode.
    pub errors: Vec<ProtocolError>,
}

impl DecodedFrame {
    /// Whether every non-blank line decoded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Serialize an envelope to a single-line frame.
pub fn encode(envelope: &Envelope) -> Result<String, SendError> {
    serde_json::to_string(envelope).map_err(|e| SendError::Encode(e.to_string()))
}

/// Decode a socket message into envelopes. Never fails as a whole.
pub fn decode(text: &str) -> DecodedFrame {
    let mut frame = DecodedFrame::default();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match decode_line(index + 1, line) {
            Ok(envelope) => frame.envelopes.push(envelope),
            Err(e) => frame.errors.push(e),
        }
    }
    frame
}

fn decode_line(line_no: usize, line: &str) -> Result<Envelope, ProtocolError> {
    let envelope: Envelope =
        serde_json::from_str(line).map_err(|e| ProtocolError::new(line_no, e.to_string()))?;
    if envelope.kind == EnvelopeType::Event
        && envelope.action.as_deref().is_none_or(str::is_empty)
    {
        return Err(ProtocolError::new(line_no, "event frame without action"));
    }
    Ok(envelope)
}
