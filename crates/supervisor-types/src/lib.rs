// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Domain types for the supervisor client core.
//!
//! This crate defines the data the supervisor protocol talks about —
//! handles, typed field values, and the records that back node/field
//! state — with NO serialization logic. Wire encode/decode lives in
//! `supervisor-wire`; stateful registry/queue/API logic lives in
//! `supervisor-client`.
//!
//! # Design Principles
//!
//! - **Pure data.** Nothing here owns a socket, a lock, or a step count.
//! - **Validated at construction.** `ScalarValue` constructors reject
//!   NaN/Infinity, degenerate rotation axes, and out-of-gamut colors
//!   before a caller can hand them to the wire layer.
//! - **Generational handles.** External references are `(generation,
//!   index)` tokens, never raw pointers — stale handles are detected by
//!   value comparison, not by scanning a live-object set.
//!
//! # Crate Features
//!
//! - `std` (default): enables `std::error::Error` impls via `thiserror`.
//!   Disable for `no_std` embedding (float validation and core math still
//!   work; only the `Error` trait impl is gated).

#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

mod error;
mod ids;
mod records;
mod validate;
mod value;

pub use error::ValidationError;
pub use ids::{FieldWireId, NodeId, ProtoScopeId, DeviceTag, FieldHandle, NodeHandle, ROOT_NODE_ID};
pub use records::{
    AnimationState, FieldRecord, FieldRequest, Label, MovieStartRequest, MovieState,
    MovieStatus, NodeRecord, RequestKind, SaveState, SceneAction, SessionState, SimulationMode,
    VectorCache,
};
pub use validate::{canonicalize_def_name, resolve_mf_index, validate_color, validate_filename_extension, validate_float, validate_rotation_axis, ImportKind};
pub use value::{FieldValue, ScalarKind, ScalarValue};
