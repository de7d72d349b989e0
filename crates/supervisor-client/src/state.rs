// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The supervisor's full mutable state, held behind the step lock
//! (spec §5 "Concurrency & Resource Model").
//!
//! Every field here is only ever touched while the step lock is held,
//! except during [`crate::transport::StepDriver::flush`], which drops
//! the lock for the duration of the round trip. A single `Mutex`
//! models that lock directly rather than threading a lock-free design
//! through every accessor.

use std::sync::Mutex;

use supervisor_types::{AnimationState, MovieState, NodeHandle, SaveState, SceneAction, SessionState};

use crate::oneshot::OneShotSlots;
use crate::queue::RequestQueue;
use crate::registry::HandleRegistry;

/// Everything the supervisor client mutates while the step lock is held.
pub struct SupervisorState {
    /// Live node/field handle registry.
    pub registry: HandleRegistry,
    /// Pending field request queue.
    pub queue: RequestQueue,
    /// Armed resolution/one-shot request slots.
    pub one_shots: OneShotSlots,
    /// Pending labels, keyed by id so repeated sets replace in place.
    pub labels: Vec<supervisor_types::Label>,
    /// The mutually-exclusive scene action armed for the next frame.
    pub scene_action: Option<SceneAction>,
    /// Nodes queued for removal this frame.
    pub pending_removals: Vec<u32>,
    /// Session-wide capture/export flags.
    pub session: SessionState,
    /// The controller's own robot node, set once `CONFIGURE` is received.
    pub self_node: Option<NodeHandle>,
    /// Last-polled movie capture status.
    pub movie_state: Option<MovieState>,
    /// Last-polled animation capture status.
    pub animation_state: Option<AnimationState>,
    /// Last-polled world-save completion status.
    pub save_state: Option<SaveState>,
    /// Last-received VR-headset reply payload.
    pub vr_reply: Option<Vec<u8>>,
    /// Outcome of the most recently answered resolution request, set by
    /// the frame reader so the API layer can read it back synchronously
    /// after a flush (spec §4.6 "reads look synchronous").
    pub last_resolved_node: Option<NodeHandle>,
    /// Outcome of the most recently answered `FIELD_GET_FROM_NAME`.
    pub last_resolved_field: Option<supervisor_types::FieldHandle>,
}

impl SupervisorState {
    /// Build fresh state with an empty registry (containing only the
    /// synthetic root) and nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: HandleRegistry::new(),
            queue: RequestQueue::new(),
            one_shots: OneShotSlots::new(),
            labels: Vec::new(),
            scene_action: None,
            pending_removals: Vec::new(),
            session: SessionState::default(),
            self_node: None,
            movie_state: None,
            animation_state: None,
            save_state: None,
            vr_reply: None,
            last_resolved_node: None,
            last_resolved_field: None,
        }
    }

    /// Arm a label, replacing any pending label with the same id.
    pub fn set_label(&mut self, label: supervisor_types::Label) {
        if let Some(existing) = self.labels.iter_mut().find(|l| l.id == label.id) {
            *existing = label;
        } else {
            self.labels.push(label);
        }
    }

    /// Queue a node for removal this frame.
    pub fn queue_removal(&mut self, node_id: u32) {
        if !self.pending_removals.contains(&node_id) {
            self.pending_removals.push(node_id);
        }
    }
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self::new()
    }
}

/// A step-lock-guarded handle on [`SupervisorState`] (spec §5: "all
/// supervisor API calls acquire a single step-scoped lock").
pub struct StepLock {
    inner: Mutex<SupervisorState>,
}

impl StepLock {
    /// Wrap fresh state in a step lock.
    #[must_use]
    pub fn new(state: SupervisorState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    /// Run `f` with the lock held. A poisoned lock (a prior holder
    /// panicked mid-step) is recovered rather than propagated, since
    /// the state inside is still structurally valid — the panicking
    /// step just didn't finish writing to it.
    pub fn with_locked<R>(&self, f: impl FnOnce(&mut SupervisorState) -> R) -> R {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }
}

impl Default for StepLock {
    fn default() -> Self {
        Self::new(SupervisorState::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_only_the_root_node() {
        let state = SupervisorState::new();
        assert!(state.registry.is_node_ref_valid(state.registry.root()));
        assert!(state.queue.is_empty());
        assert!(!state.one_shots.has_resolution());
    }

    #[test]
    fn set_label_replaces_by_id() {
        let mut state = SupervisorState::new();
        state.set_label(supervisor_types::Label {
            id: 1,
            text: "a".into(),
            font: "Arial".into(),
            x: 0.0,
            y: 0.0,
            size: 0.1,
            color_with_alpha: 0,
        });
        state.set_label(supervisor_types::Label {
            id: 1,
            text: "b".into(),
            font: "Arial".into(),
            x: 0.0,
            y: 0.0,
            size: 0.1,
            color_with_alpha: 0,
        });
        assert_eq!(state.labels.len(), 1);
        assert_eq!(state.labels[0].text, "b");
    }

    #[test]
    fn queue_removal_is_deduplicated() {
        let mut state = SupervisorState::new();
        state.queue_removal(5);
        state.queue_removal(5);
        assert_eq!(state.pending_removals, vec![5]);
    }

    #[test]
    fn step_lock_grants_exclusive_access() {
        let lock = StepLock::default();
        let count = lock.with_locked(|state| {
            state.queue_removal(1);
            state.pending_removals.len()
        });
        assert_eq!(count, 1);
    }
}
