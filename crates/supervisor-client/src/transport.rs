// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The step-lock-unlocked flush primitive and its test double (spec
//! §5 "flush" operation).
//!
//! The binary transport and step-driver are explicitly out of scope —
//! this module only defines the seam a real one plugs into:
//! [`StepDriver::flush`] drops the step lock, writes one outbound
//! frame, blocks for the paired reply batch, and returns it so the
//! caller can reacquire the lock and apply it.

use supervisor_wire::{ByteReader, ByteWriter, ServerEvent};

use crate::error::ApiError;

/// A transport capable of performing one request/reply round trip
/// while the caller's step lock is released.
pub trait StepDriver {
    /// Write `frame` to the server and block until its paired reply
    /// batch is available, decoding every message in it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the frame could not be sent
    /// or the reply could not be read/decoded.
    fn flush(&mut self, frame: &[u8]) -> Result<Vec<ServerEvent>, ApiError>;
}

/// An in-memory [`StepDriver`] that answers deterministically from a
/// scripted queue of reply batches, for exercising the registry/queue/
/// state machinery without a real transport.
///
/// Grounded on the same "hand back canned state transitions" idiom as
/// an in-memory test double for an external system: each call to
/// [`Self::flush`] pops the next scripted batch (panicking via an
/// error return, never a panic, if the script is exhausted) and
/// records the frame bytes it was given so tests can assert on what
/// the frame writer actually emitted.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripted_replies: std::collections::VecDeque<Vec<ServerEvent>>,
    sent_frames: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Build a transport with no scripted replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply batch to be returned by the next [`Self::flush`] call.
    pub fn push_reply(&mut self, events: Vec<ServerEvent>) {
        self.scripted_replies.push_back(events);
    }

    /// Every frame sent so far, in order, for assertions in tests.
    #[must_use]
    pub fn sent_frames(&self) -> &[Vec<u8>] {
        &self.sent_frames
    }

    /// Number of frames sent so far.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.sent_frames.len()
    }
}

impl StepDriver for MockTransport {
    fn flush(&mut self, frame: &[u8]) -> Result<Vec<ServerEvent>, ApiError> {
        self.sent_frames.push(frame.to_vec());
        self.scripted_replies
            .pop_front()
            .ok_or_else(|| ApiError::Transport("mock transport has no scripted reply".into()))
    }
}

/// Decode a raw reply batch: a sequence of back-to-back wire messages
/// with no outer length prefix (each message's opcode determines its
/// own length).
///
/// # Errors
///
/// Returns [`ApiError::Transport`] if any message fails to decode.
pub fn decode_reply_batch(bytes: &[u8]) -> Result<Vec<ServerEvent>, ApiError> {
    let mut reader = ByteReader::new(bytes);
    let mut events = Vec::new();
    while reader.remaining() > 0 {
        let event = supervisor_wire::decode_event(&mut reader)
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        events.push(event);
    }
    Ok(events)
}

/// Serialize a batch of already-encoded items into one frame buffer.
///
/// Assembly order is the caller's responsibility (spec §4.4 priority
/// groups); this just concatenates whatever was written to `writer`.
#[must_use]
pub fn finish_frame(writer: ByteWriter) -> Vec<u8> {
    writer.into_bytes()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn mock_transport_replays_scripted_batches_in_order() {
        let mut transport = MockTransport::new();
        transport.push_reply(vec![ServerEvent::NodeRegenerated]);
        transport.push_reply(vec![ServerEvent::Configure {
            self_node_id: 1,
            is_proto_internal: false,
        }]);
        let first = transport.flush(&[0x01]).unwrap();
        assert_eq!(first, vec![ServerEvent::NodeRegenerated]);
        let second = transport.flush(&[0x02]).unwrap();
        assert_eq!(
            second,
            vec![ServerEvent::Configure {
                self_node_id: 1,
                is_proto_internal: false
            }]
        );
        assert_eq!(transport.frame_count(), 2);
    }

    #[test]
    fn flush_with_no_script_reports_transport_error() {
        let mut transport = MockTransport::new();
        assert!(matches!(
            transport.flush(&[0x01]),
            Err(ApiError::Transport(_))
        ));
    }

    #[test]
    fn decode_reply_batch_splits_concatenated_messages() {
        let mut w = ByteWriter::new();
        w.u8(supervisor_wire::ReplyOpcode::NodeRegenerated.wire_tag());
        w.u8(supervisor_wire::ReplyOpcode::Configure.wire_tag());
        w.u32(2);
        w.bool(true);
        let bytes = w.into_bytes();
        let events = decode_reply_batch(&bytes).unwrap();
        assert_eq!(events.len(), 2);
    }
}
