// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The outbound field-request queue and its garbage list (spec §4.3,
//! component C4).
//!
//! The C original appends every mutation to an intrusive list and frees
//! entries lazily once a step boundary confirms the server has seen
//! them. Here the list is an owned `VecDeque<FieldRequest>`; the
//! garbage list becomes a simple generation counter, since Rust drops
//! the owned payload the moment the queue entry is popped rather than
//! needing a deferred free pass.

use std::collections::VecDeque;

use supervisor_types::{FieldHandle, FieldRequest, FieldValue, RequestKind};
use tracing::trace;

/// Whether enqueuing a request requires an immediate flush before the
/// API call can return (spec §4.3): `GET`/`IMPORT`/`IMPORT_FROM_STRING`/
/// `REMOVE` are synchronous from the caller's point of view; `SET` is
/// deferred to the next frame.
#[must_use]
pub const fn requires_immediate_flush(kind: RequestKind) -> bool {
    !matches!(kind, RequestKind::Set)
}

/// FIFO of pending field requests with SET/SET and SET/GET coalescing.
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: VecDeque<FieldRequest>,
    /// Count of requests flushed and retired since construction, used
    /// only for diagnostics (mirrors the C original's garbage-list
    /// bookkeeping, which this port no longer needs for correctness).
    retired: u64,
}

/// Outcome of submitting a request to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coalesced {
    /// The request was appended to the queue as a new entry.
    Enqueued,
    /// An existing pending `SET` at the same `(field, index)` was overwritten.
    OverwroteSet,
}

impl RequestQueue {
    /// Build an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any request is pending flush.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of requests pending flush.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Find a pending `SET` at the same `(field, index)`, if any (spec
    /// §4.3 read-your-writes coalescing: used both to short-circuit a
    /// `GET` and to overwrite on a repeated `SET`).
    #[must_use]
    pub fn find_pending_set(&self, field: FieldHandle, index: i32) -> Option<&FieldRequest> {
        self.pending.iter().rev().find(|req| {
            req.kind == RequestKind::Set && req.field == field && req.index == index
        })
    }

    /// Submit a `SET`: overwrites an existing pending `SET` at the same
    /// `(field, index)` in place, preserving queue order; otherwise
    /// appends.
    pub fn submit_set(&mut self, field: FieldHandle, index: i32, data: FieldValue) -> Coalesced {
        if let Some(existing) = self.pending.iter_mut().rev().find(|req| {
            req.kind == RequestKind::Set && req.field == field && req.index == index
        }) {
            existing.data = Some(data);
            trace!(?field, index, "coalesced SET onto pending SET");
            return Coalesced::OverwroteSet;
        }
        self.pending.push_back(FieldRequest {
            kind: RequestKind::Set,
            field,
            index,
            data: Some(data),
        });
        Coalesced::Enqueued
    }

    /// Submit a non-`SET` request (`GET`/`IMPORT`/`IMPORT_FROM_STRING`/
    /// `REMOVE`) unconditionally; these never coalesce with each other.
    pub fn submit(&mut self, request: FieldRequest) {
        self.pending.push_back(request);
    }

    /// Drain every pending request in FIFO order, for frame assembly.
    pub fn drain(&mut self) -> impl Iterator<Item = FieldRequest> + '_ {
        self.retired = self.retired.saturating_add(self.pending.len() as u64);
        self.pending.drain(..)
    }

    /// Iterate pending requests without draining them (frame-writer preview).
    pub fn iter(&self) -> impl Iterator<Item = &FieldRequest> {
        self.pending.iter()
    }

    /// Total requests ever retired from this queue (diagnostics only).
    #[must_use]
    pub const fn retired(&self) -> u64 {
        self.retired
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use supervisor_types::ScalarValue;

    fn field(index: u32) -> FieldHandle {
        FieldHandle::from_raw_parts(0, index)
    }

    #[test]
    fn repeated_set_overwrites_in_place() {
        let mut queue = RequestQueue::new();
        queue.submit_set(field(1), -1, FieldValue::Sf(ScalarValue::Int32(1)));
        let outcome = queue.submit_set(field(1), -1, FieldValue::Sf(ScalarValue::Int32(2)));
        assert_eq!(outcome, Coalesced::OverwroteSet);
        assert_eq!(queue.len(), 1);
        let pending = queue.find_pending_set(field(1), -1).unwrap();
        assert_eq!(pending.data, Some(FieldValue::Sf(ScalarValue::Int32(2))));
    }

    #[test]
    fn distinct_fields_do_not_coalesce() {
        let mut queue = RequestQueue::new();
        queue.submit_set(field(1), -1, FieldValue::Sf(ScalarValue::Int32(1)));
        queue.submit_set(field(2), -1, FieldValue::Sf(ScalarValue::Int32(2)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn get_requires_immediate_flush_but_set_does_not() {
        assert!(requires_immediate_flush(RequestKind::Get));
        assert!(requires_immediate_flush(RequestKind::Remove));
        assert!(!requires_immediate_flush(RequestKind::Set));
    }

    #[test]
    fn drain_empties_queue_in_fifo_order() {
        let mut queue = RequestQueue::new();
        queue.submit_set(field(1), -1, FieldValue::Sf(ScalarValue::Int32(1)));
        queue.submit_set(field(2), -1, FieldValue::Sf(ScalarValue::Int32(2)));
        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.retired(), 2);
    }
}
