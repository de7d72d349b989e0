// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Armed one-shot request slots (spec §4.4 priority groups 2 and 6).
//!
//! A resolution request (node-by-id/def/tag/selected, field-by-name)
//! and a physics/session one-shot are each mutually exclusive with
//! their own kind: arming a second resolution request before the first
//! is flushed replaces it, matching the C original's single static
//! `pending_resolution` slot rather than a queue.

use supervisor_wire::{OneShot, ResolutionRequest};
use tracing::trace;

/// Holds at most one armed [`ResolutionRequest`] and at most one armed
/// [`OneShot`], per spec §4.4.
#[derive(Debug, Default)]
pub struct OneShotSlots {
    resolution: Option<ResolutionRequest>,
    physics: Option<OneShot>,
}

impl OneShotSlots {
    /// Build empty slots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a resolution request, replacing any currently armed.
    pub fn arm_resolution(&mut self, request: ResolutionRequest) {
        if self.resolution.is_some() {
            trace!("replacing previously-armed resolution request");
        }
        self.resolution = Some(request);
    }

    /// Arm a one-shot physics/session request, replacing any currently armed.
    pub fn arm_one_shot(&mut self, request: OneShot) {
        if self.physics.is_some() {
            trace!("replacing previously-armed one-shot request");
        }
        self.physics = Some(request);
    }

    /// Whether a resolution request is currently armed.
    #[must_use]
    pub const fn has_resolution(&self) -> bool {
        self.resolution.is_some()
    }

    /// Whether a one-shot physics/session request is currently armed.
    #[must_use]
    pub const fn has_one_shot(&self) -> bool {
        self.physics.is_some()
    }

    /// Borrow the armed resolution request for frame assembly.
    #[must_use]
    pub const fn peek_resolution(&self) -> Option<&ResolutionRequest> {
        self.resolution.as_ref()
    }

    /// Borrow the armed one-shot request for frame assembly.
    #[must_use]
    pub const fn peek_one_shot(&self) -> Option<&OneShot> {
        self.physics.as_ref()
    }

    /// Take and clear the armed resolution request after its reply is observed.
    pub fn take_resolution(&mut self) -> Option<ResolutionRequest> {
        self.resolution.take()
    }

    /// Take and clear the armed one-shot request after its reply is observed.
    pub fn take_one_shot(&mut self) -> Option<OneShot> {
        self.physics.take()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn arming_twice_replaces_the_slot() {
        let mut slots = OneShotSlots::new();
        slots.arm_resolution(ResolutionRequest::NodeById(1));
        slots.arm_resolution(ResolutionRequest::NodeById(2));
        assert_eq!(slots.peek_resolution(), Some(&ResolutionRequest::NodeById(2)));
    }

    #[test]
    fn take_clears_the_slot() {
        let mut slots = OneShotSlots::new();
        slots.arm_one_shot(OneShot::ResetPhysics);
        assert!(slots.has_one_shot());
        assert_eq!(slots.take_one_shot(), Some(OneShot::ResetPhysics));
        assert!(!slots.has_one_shot());
    }
}
