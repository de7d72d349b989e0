// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Runtime configuration for a [`crate::SupervisorState`] (ambient stack:
//! this has no counterpart in spec.md's core — every real deployment of
//! a registry this size needs a place to put the knobs the spec leaves
//! implicit).

/// Construction-time configuration for the supervisor client core.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Whether the calling controller holds the supervisor role.
    ///
    /// Mirrors spec §7 category 1: every public API call checks this
    /// before doing anything else.
    pub is_supervisor: bool,

    /// Whether the process is in the process of quitting.
    ///
    /// While `true`, stale-handle diagnostics are suppressed (spec §7
    /// category 3) since a torn-down scene produces a flood of handles
    /// that were valid a moment ago.
    pub quitting: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            is_supervisor: true,
            quitting: false,
        }
    }
}

impl SupervisorConfig {
    /// Build a config for a non-supervisor controller, for exercising
    /// the category-1 role-violation path in tests.
    #[must_use]
    pub fn non_supervisor() -> Self {
        Self {
            is_supervisor: false,
            ..Self::default()
        }
    }
}
