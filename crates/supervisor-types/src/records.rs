// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Records backing queued requests, labels, and session-wide state
//! (spec §3, §4.3, §4.4).
//!
//! The C original threads these through an intrusive `next` pointer so
//! the queue and garbage list can share storage with zero allocation.
//! Here the queue (`supervisor-client::queue`) owns a `VecDeque` of
//! these records directly — no embedded link field.

use alloc::string::String;
use alloc::vec::Vec;

use crate::ids::{DeviceTag, FieldHandle, FieldWireId, NodeHandle, NodeId};
use crate::value::{FieldValue, ScalarKind};

/// A lazily-populated physics vector cache. `None` until first demanded;
/// `Some` indicates a value was validly received from the server.
pub type VectorCache<const N: usize> = Option<[f64; N]>;

/// The record backing a live [`NodeHandle`] (spec §3 "Node handle").
///
/// Vector caches are absent until first demanded by a one-shot read;
/// presence indicates the most recent fetch succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// Server-assigned node id (`0` is the synthetic root).
    pub id: NodeId,
    /// Node type tag, as reported by the server.
    pub type_tag: i32,
    /// Model name, `None` when equal to the base type name.
    pub model_name: Option<String>,
    /// DEF name, extracted as the segment after the last `.` in a dotted path.
    pub def_name: Option<String>,
    /// Parent node id, or `-1` if this is the root or its parent was removed.
    pub parent_id: i32,
    /// Device tag, if this node wraps a device.
    pub device_tag: Option<DeviceTag>,
    /// Whether this node is itself a PROTO instance.
    pub is_proto: bool,
    /// Whether this node was obtained via DEF lookup inside a PROTO scope,
    /// or is a contact-point sub-node. Purged wholesale on scene regeneration.
    pub is_proto_internal: bool,
    /// The PROTO instance that owns this node, if any.
    pub parent_proto: Option<NodeHandle>,
    /// Cached global position, `[x, y, z]`.
    pub position: VectorCache<3>,
    /// Cached orientation matrix, row-major 3x3.
    pub orientation: VectorCache<9>,
    /// Cached center of mass, `[x, y, z]`.
    pub center_of_mass: VectorCache<3>,
    /// Cached contact points, `3` components per point.
    pub contact_points: Option<Vec<f64>>,
    /// Node id owning each contact point in `contact_points`, paired by index.
    pub contact_point_node_ids: Option<Vec<NodeId>>,
    /// Simulation time at which `contact_points` was captured.
    pub contact_points_time_stamp: Option<f64>,
    /// Cached static-balance flag.
    pub static_balance: Option<bool>,
    /// Cached linear+angular velocity, `[vx, vy, vz, wx, wy, wz]`.
    pub solid_velocity: VectorCache<6>,
}

impl NodeRecord {
    /// Construct a freshly-resolved node record with all caches empty.
    #[must_use]
    pub const fn new(id: NodeId, type_tag: i32, parent_id: i32) -> Self {
        Self {
            id,
            type_tag,
            model_name: None,
            def_name: None,
            parent_id,
            device_tag: None,
            is_proto: false,
            is_proto_internal: false,
            parent_proto: None,
            position: None,
            orientation: None,
            center_of_mass: None,
            contact_points: None,
            contact_point_node_ids: None,
            contact_points_time_stamp: None,
            static_balance: None,
            solid_velocity: None,
        }
    }
}

/// The record backing a live [`crate::FieldHandle`] (spec §3 "Field handle").
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    /// Field name.
    pub name: String,
    /// Owning node id.
    pub node_id: NodeId,
    /// Server-assigned field id.
    pub field_id: FieldWireId,
    /// Scalar kind this field carries.
    pub kind: ScalarKind,
    /// `true` for a multi-valued (MF) field, `false` for single-valued (SF).
    pub is_mf: bool,
    /// Element count for MF fields; `-1` for SF.
    pub mf_count: i32,
    /// Read-only because the field belongs to a PROTO-internal node.
    pub is_proto_internal: bool,
    /// Most recently observed value, backing GET results and SET/GET coalescing.
    pub last_value: Option<FieldValue>,
}

impl FieldRecord {
    /// Construct a freshly-resolved field record with no cached value.
    #[must_use]
    pub const fn new(
        name: String,
        node_id: NodeId,
        field_id: FieldWireId,
        kind: ScalarKind,
        is_mf: bool,
        mf_count: i32,
        is_proto_internal: bool,
    ) -> Self {
        Self {
            name,
            node_id,
            field_id,
            kind,
            is_mf,
            mf_count,
            is_proto_internal,
            last_value: None,
        }
    }
}

/// The operation a queued [`FieldRequest`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Fetch the field's current value.
    Get,
    /// Overwrite the field's value (SF) or one element (MF).
    Set,
    /// Insert an MF-node element from a filename or textual node string.
    Import,
    /// Insert an MF-node element from an in-memory node string.
    ImportFromString,
    /// Remove one MF element.
    Remove,
}

/// A queued mutation or fetch against a field (spec §3 "Field request").
///
/// `index` is `-1` for SF operations and the resolved non-negative
/// position for MF operations. `data` is absent for `Get` and `Remove`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRequest {
    /// Which operation this record performs.
    pub kind: RequestKind,
    /// The field this request targets.
    pub field: FieldHandle,
    /// Resolved element index, or `-1` for SF.
    pub index: i32,
    /// Payload for `Set`/`Import`/`ImportFromString`; `None` for `Get`/`Remove`.
    pub data: Option<FieldValue>,
}

impl FieldRequest {
    /// Whether this request carries an owned string payload (import
    /// filename/node-string, or an SF/MF string `Set`).
    ///
    /// Mirrors the original's `is_string` flag, which marked that
    /// `data` needed deferred free — in this port the payload's own
    /// `String`/`Vec` ownership makes that bookkeeping automatic, but
    /// the predicate survives because the garbage-list timing (spec
    /// §5) still depends on knowing which requests borrow string data
    /// during frame serialization.
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self.kind, RequestKind::Import | RequestKind::ImportFromString)
            || matches!(
                &self.data,
                Some(FieldValue::Sf(crate::ScalarValue::String(_)))
            )
    }
}

/// An on-screen overlay label (spec §3 "Label").
///
/// Keyed by `id`; setting the same id again replaces its text/font.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// Overlay identifier; re-setting the same id replaces prior contents.
    pub id: u16,
    /// Display text.
    pub text: String,
    /// Font name.
    pub font: String,
    /// Horizontal position, normalized to `[0, 1]`.
    pub x: f64,
    /// Vertical position, normalized to `[0, 1]`.
    pub y: f64,
    /// Font size, normalized to `[0, 1]`.
    pub size: f64,
    /// Packed RGBA color.
    pub color_with_alpha: u32,
}

/// The mutually-exclusive global action armed for the next frame
/// (spec §4.4 priority group 1: at most one of these may be pending).
#[derive(Debug, Clone, PartialEq)]
pub enum SceneAction {
    /// Request termination with the given exit status.
    Quit(i32),
    /// Reset the simulation.
    Reset,
    /// Reset physics only, keeping scene state.
    ResetPhysics,
    /// Reload the current world file.
    Reload,
    /// Load a different world file.
    LoadWorld(String),
    /// Switch the simulation's run mode.
    ModeChange(SimulationMode),
}

/// Simulation run mode, as accepted by [`SceneAction::ModeChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationMode {
    /// Paused.
    Pause,
    /// Real-time playback.
    RealTime,
    /// Run as fast as possible.
    Fast,
}

/// Movie/animation/save completion status reported by the server.
///
/// Values ordered `> Saving` indicate failure (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum MovieStatus {
    /// No recording in progress; idle.
    Ready = 0,
    /// Actively recording frames.
    Recording = 1,
    /// Encoding/flushing to disk.
    Saving = 2,
    /// The simulation itself errored during recording.
    SimulationError = 3,
    /// A filesystem error occurred while writing output.
    FileError = 4,
    /// The video encoder reported an error.
    EncodingError = 5,
}

impl MovieStatus {
    /// Whether this status represents a failure (ordered after `Saving`).
    #[must_use]
    pub const fn is_failure(self) -> bool {
        (self as u8) > (Self::Saving as u8)
    }
}

/// Polled state of an in-progress or finished movie capture.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieState {
    /// Current server-reported status.
    pub status: MovieStatus,
}

/// Polled state of an in-progress or finished animation capture.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationState {
    /// Current server-reported status.
    pub status: MovieStatus,
}

/// Polled state of a world-save request.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveState {
    /// Whether the save completed successfully.
    pub succeeded: bool,
}

/// Single-writer flags and payloads for session-wide actions not
/// covered by [`SceneAction`] (spec §3 "Session state").
///
/// Each populated field is consumed — and cleared — by the next frame
/// write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Pending `EXPORT_IMAGE` request: `(filename, quality)`.
    pub export_image: Option<(String, u8)>,
    /// Pending `START_MOVIE` request.
    pub movie_start: Option<MovieStartRequest>,
    /// Pending stop-movie request.
    pub movie_stop: bool,
    /// Pending start-animation request: target filename.
    pub animation_start: Option<String>,
    /// Pending stop-animation request.
    pub animation_stop: bool,
    /// Pending `SAVE_WORLD` request: `Some(filename)` or `Some(empty)` for "use current".
    pub save_world: Option<Option<String>>,
    /// Pending VR-headset query flag.
    pub vr_query: bool,
}

/// Parameters for a `START_MOVIE` request (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct MovieStartRequest {
    /// Output filename.
    pub filename: String,
    /// Frame width in pixels.
    pub width: i32,
    /// Frame height in pixels.
    pub height: i32,
    /// Server-defined codec identifier.
    pub codec: u8,
    /// Encoding quality, `0..=100`.
    pub quality: u8,
    /// Whether to use hardware acceleration.
    pub accelerated: bool,
    /// Whether to burn in an on-screen caption.
    pub caption: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn movie_status_ordering_matches_failure_threshold() {
        assert!(!MovieStatus::Ready.is_failure());
        assert!(!MovieStatus::Saving.is_failure());
        assert!(MovieStatus::SimulationError.is_failure());
        assert!(MovieStatus::EncodingError.is_failure());
    }

    #[test]
    fn field_request_is_string_for_import_kinds() {
        let req = FieldRequest {
            kind: RequestKind::Import,
            field: FieldHandle::from_raw_parts(0, 0),
            index: 3,
            data: None,
        };
        assert!(req.is_string());

        let get_req = FieldRequest {
            kind: RequestKind::Get,
            field: FieldHandle::from_raw_parts(0, 0),
            index: -1,
            data: None,
        };
        assert!(!get_req.is_string());
    }

    #[test]
    fn session_state_defaults_to_all_clear() {
        let state = SessionState::default();
        assert!(state.export_image.is_none());
        assert!(!state.movie_stop);
    }
}
