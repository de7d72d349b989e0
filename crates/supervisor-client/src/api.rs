// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Public API layer (spec §4.6, component C8).
//!
//! Every externally visible operation follows the same six-step shape:
//! assert the supervisor role, validate arguments, acquire the step
//! lock, enqueue/arm/coalesce, optionally flush unlocked, then reset
//! per-frame state and copy results out. The "engine" methods below
//! return [`ApiError`] so callers that want the raw failure cause can
//! match on it; the handful of spec-named typed accessors at the
//! bottom wrap those in the sentinel-return contract of spec §7 —
//! log via `tracing`, return a sentinel, never panic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use supervisor_types::{
    resolve_mf_index, validate_color, validate_filename_extension, validate_float,
    validate_rotation_axis, FieldHandle, FieldRecord, FieldRequest, FieldValue, ImportKind, Label,
    MovieStartRequest, MovieStatus, NodeHandle, RequestKind, ScalarKind, ScalarValue, SceneAction,
    SimulationMode, ValidationError, ROOT_NODE_ID,
};
use supervisor_wire::{OneShot, ResolutionRequest};

use crate::error::ApiError;
use crate::frame::{apply_event, clear_frame, write_frame};
use crate::state::StepLock;
use crate::transport::StepDriver;
use crate::SupervisorConfig;

fn validate_scalar(value: &ScalarValue) -> Result<(), ValidationError> {
    match value {
        ScalarValue::Float(v) => validate_float(*v),
        ScalarValue::Vec2f(v) => v.iter().try_for_each(|c| validate_float(*c)),
        ScalarValue::Vec3f(v) => v.iter().try_for_each(|c| validate_float(*c)),
        ScalarValue::Rotation([x, y, z, angle]) => {
            validate_float(*x)?;
            validate_float(*y)?;
            validate_float(*z)?;
            validate_float(*angle)?;
            validate_rotation_axis(*x, *y, *z)
        }
        ScalarValue::Color([r, g, b]) => validate_color(*r, *g, *b),
        ScalarValue::Bool(_) | ScalarValue::Int32(_) | ScalarValue::String(_) | ScalarValue::Node(_) => Ok(()),
    }
}

fn scalar_from_field_value(value: &FieldValue) -> Option<ScalarValue> {
    match value {
        FieldValue::Sf(v) => Some(v.clone()),
        FieldValue::Mf(values) => values.first().cloned(),
    }
}

/// The full supervisor client: registry, queue, step lock, and
/// transport, exposing every spec-defined operation family behind the
/// six-step call shape.
pub struct SupervisorApi<T: StepDriver> {
    config: SupervisorConfig,
    lock: StepLock,
    transport: Mutex<T>,
    get_in_flight: AtomicBool,
}

impl<T: StepDriver> SupervisorApi<T> {
    /// Build an API instance around fresh state and the given transport.
    #[must_use]
    pub fn new(config: SupervisorConfig, transport: T) -> Self {
        Self {
            config,
            lock: StepLock::default(),
            transport: Mutex::new(transport),
            get_in_flight: AtomicBool::new(false),
        }
    }

    /// Invalidate the per-step one-shot caches (position, orientation,
    /// center of mass, velocity, contact points, static balance) on
    /// every node, so the next one-shot query round-trips instead of
    /// returning a stale cached value from a prior step. Callers drive
    /// this at the top of each simulation step (spec §4.3's "drained at
    /// the top of the next read-answer cycle" boundary, generalized to
    /// one-shot node caches as well as the request garbage list).
    pub fn begin_step(&self) {
        self.lock.with_locked(|state| {
            for record in state.registry.nodes_mut() {
                record.position = None;
                record.orientation = None;
                record.center_of_mass = None;
                record.contact_points = None;
                record.contact_point_node_ids = None;
                record.contact_points_time_stamp = None;
                record.static_balance = None;
                record.solid_velocity = None;
            }
        });
    }

    fn assert_supervisor(&self) -> Result<(), ApiError> {
        if self.config.is_supervisor {
            Ok(())
        } else {
            Err(ApiError::NotSupervisor)
        }
    }

    fn node_id(&self, node: NodeHandle) -> Result<u32, ApiError> {
        self.lock
            .with_locked(|state| state.registry.node(node).map(|r| r.id))
            .ok_or(ApiError::StaleHandle)
    }

    fn field_snapshot(&self, field: FieldHandle) -> Result<FieldRecord, ApiError> {
        self.lock
            .with_locked(|state| state.registry.field(field).cloned())
            .ok_or(ApiError::StaleHandle)
    }

    /// Flush the current frame: write it, release the step lock for the
    /// round trip, then reacquire and apply every reply in order (spec
    /// §4.6 step 5).
    fn flush(&self) -> Result<(), ApiError> {
        let frame = self.lock.with_locked(write_frame);
        let replies = {
            let mut transport = self
                .transport
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            transport.flush(&frame)?
        };
        self.lock.with_locked(|state| {
            clear_frame(state);
            for event in replies {
                apply_event(state, event);
            }
        });
        Ok(())
    }

    fn log_error(&self, err: &ApiError) {
        if matches!(err, ApiError::StaleHandle) && self.config.quitting {
            return;
        }
        tracing::warn!(error = %err, "supervisor API call failed");
    }

    fn sentinel<R>(&self, result: Result<R, ApiError>, default: R) -> R {
        match result {
            Ok(value) => value,
            Err(err) => {
                self.log_error(&err);
                default
            }
        }
    }

    // ---- Session control (spec §4.4 priority group 1) ----

    /// Request process termination with the given exit status.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotSupervisor`] if the caller isn't the supervisor.
    pub fn quit(&self, status: i32) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        self.lock.with_locked(|state| state.scene_action = Some(SceneAction::Quit(status)));
        Ok(())
    }

    /// Reset the simulation.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotSupervisor`] if the caller isn't the supervisor.
    pub fn simulation_reset(&self) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        self.lock.with_locked(|state| state.scene_action = Some(SceneAction::Reset));
        Ok(())
    }

    /// Reset physics only, keeping scene state.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotSupervisor`] if the caller isn't the supervisor.
    pub fn simulation_reset_physics(&self) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        self.lock.with_locked(|state| state.scene_action = Some(SceneAction::ResetPhysics));
        Ok(())
    }

    /// Reload the current world file.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotSupervisor`] if the caller isn't the supervisor.
    pub fn world_reload(&self) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        self.lock.with_locked(|state| state.scene_action = Some(SceneAction::Reload));
        Ok(())
    }

    /// Load a different world file.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if `filename` is empty.
    pub fn world_load(&self, filename: &str) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        if filename.is_empty() {
            return Err(ValidationError::EmptyString.into());
        }
        self.lock
            .with_locked(|state| state.scene_action = Some(SceneAction::LoadWorld(filename.to_string())));
        Ok(())
    }

    /// Switch the simulation's run mode.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotSupervisor`] if the caller isn't the supervisor.
    pub fn simulation_set_mode(&self, mode: SimulationMode) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        self.lock.with_locked(|state| state.scene_action = Some(SceneAction::ModeChange(mode)));
        Ok(())
    }

    // ---- Resolution (spec §4.4 priority group 2) ----

    /// Resolve a node by server-assigned id, consulting the local
    /// registry first so a handle already known performs no round trip.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the round trip fails.
    pub fn node_get_from_id(&self, id: u32) -> Result<Option<NodeHandle>, ApiError> {
        self.assert_supervisor()?;
        if let Some(handle) = self.lock.with_locked(|state| state.registry.find_node_by_id(id)) {
            return Ok(Some(handle));
        }
        self.lock
            .with_locked(|state| state.one_shots.arm_resolution(ResolutionRequest::NodeById(id)));
        self.flush()?;
        Ok(self.lock.with_locked(|state| state.last_resolved_node))
    }

    /// Resolve a node by dotted DEF-name expression, qualified by an
    /// optional enclosing PROTO scope. Repeated lookups of the same
    /// `(def, scope)` after the first resolution return an identical
    /// handle with no further round trip (spec §8).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if `def` is empty, or
    /// [`ApiError::Transport`] if the round trip fails.
    pub fn node_get_from_def(
        &self,
        def: &str,
        proto_scope: Option<NodeHandle>,
    ) -> Result<Option<NodeHandle>, ApiError> {
        self.assert_supervisor()?;
        if def.is_empty() {
            return Err(ValidationError::EmptyString.into());
        }
        if let Some(handle) = self
            .lock
            .with_locked(|state| state.registry.find_node_by_def(def, proto_scope))
        {
            return Ok(Some(handle));
        }
        let proto_scope_id = self.lock.with_locked(|state| {
            proto_scope.map_or(-1, |h| {
                state.registry.node(h).map_or(-1, |r| i32::try_from(r.id).unwrap_or(-1))
            })
        });
        self.lock.with_locked(|state| {
            state.one_shots.arm_resolution(ResolutionRequest::NodeByDef {
                def: def.to_string(),
                proto_scope_id,
            });
        });
        self.flush()?;
        Ok(self.lock.with_locked(|state| state.last_resolved_node))
    }

    /// Resolve a node by device tag.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the round trip fails.
    pub fn node_get_from_tag(&self, tag: i32) -> Result<Option<NodeHandle>, ApiError> {
        self.assert_supervisor()?;
        if let Some(handle) = self.lock.with_locked(|state| state.registry.find_node_by_tag(tag)) {
            return Ok(Some(handle));
        }
        self.lock
            .with_locked(|state| state.one_shots.arm_resolution(ResolutionRequest::NodeByTag(tag)));
        self.flush()?;
        Ok(self.lock.with_locked(|state| state.last_resolved_node))
    }

    /// Resolve the currently selected node in the scene tree GUI. Always
    /// round-trips, since selection may change between calls.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the round trip fails.
    pub fn node_get_selected(&self) -> Result<Option<NodeHandle>, ApiError> {
        self.assert_supervisor()?;
        self.lock
            .with_locked(|state| state.one_shots.arm_resolution(ResolutionRequest::NodeSelected));
        self.flush()?;
        Ok(self.lock.with_locked(|state| state.last_resolved_node))
    }

    /// Resolve a field by name on a known node.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::StaleHandle`] if `node` is not live, or
    /// [`ApiError::Validation`] if `name` is empty.
    pub fn field_get_from_name(
        &self,
        node: NodeHandle,
        name: &str,
        allow_proto: bool,
    ) -> Result<Option<FieldHandle>, ApiError> {
        self.assert_supervisor()?;
        if name.is_empty() {
            return Err(ValidationError::EmptyString.into());
        }
        let node_id = self.node_id(node)?;
        if let Some(handle) = self
            .lock
            .with_locked(|state| state.registry.find_field_by_name(node_id, name))
        {
            return Ok(Some(handle));
        }
        self.lock.with_locked(|state| {
            state.one_shots.arm_resolution(ResolutionRequest::FieldByName {
                node: node_id,
                name: name.to_string(),
                allow_proto,
            });
        });
        self.flush()?;
        Ok(self.lock.with_locked(|state| state.last_resolved_field))
    }

    // ---- Field access (spec §4.2, §4.3) ----

    /// Fetch a field's value at `index` (`-1` for SF fields). Short-
    /// circuits on a pending coalesced `SET` at the same position with
    /// zero frames emitted (spec §8 read-your-writes invariant).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::GetAlreadyInFlight`] if another `GET` is
    /// already outstanding, or [`ApiError::Transport`] on a round-trip
    /// failure.
    pub fn field_get(&self, field: FieldHandle, index: i32) -> Result<ScalarValue, ApiError> {
        self.assert_supervisor()?;
        let record = self.field_snapshot(field)?;
        let resolved_index = if record.is_mf {
            resolve_mf_index(index, record.mf_count, ImportKind::GetOrSet)?
        } else {
            -1
        };

        if let Some(request) = self
            .lock
            .with_locked(|state| state.queue.find_pending_set(field, resolved_index).cloned())
        {
            if let Some(value) = request.data.as_ref().and_then(scalar_from_field_value) {
                return Ok(value);
            }
        }

        if self.get_in_flight.swap(true, Ordering::AcqRel) {
            return Err(ApiError::GetAlreadyInFlight);
        }
        let outcome: Result<ScalarValue, ApiError> = (|| {
            self.lock.with_locked(|state| {
                state.queue.submit(FieldRequest {
                    kind: RequestKind::Get,
                    field,
                    index: resolved_index,
                    data: None,
                });
            });
            self.flush()?;
            self.lock
                .with_locked(|state| state.registry.field(field).and_then(|r| r.last_value.as_ref().and_then(scalar_from_field_value)))
                .ok_or(ApiError::StaleHandle)
        })();
        self.get_in_flight.store(false, Ordering::Release);
        outcome
    }

    /// Overwrite a field's value at `index` (`-1` for SF fields).
    /// Coalesces onto a pending `SET` at the same position; deferred to
    /// the next flush rather than round-tripping immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if the value fails well-
    /// formedness checks, doesn't match the field's kind, or the field
    /// is PROTO-internal; [`ApiError::StaleHandle`] if `field` is stale.
    pub fn field_set(&self, field: FieldHandle, index: i32, value: ScalarValue) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        validate_scalar(&value)?;
        let record = self.field_snapshot(field)?;
        if record.is_proto_internal {
            return Err(ValidationError::ProtoInternalReadOnly.into());
        }
        if value.kind() != record.kind {
            return Err(ValidationError::WrongFieldKind {
                expected: record.kind,
                actual: value.kind(),
            }
            .into());
        }
        let (resolved_index, data) = if record.is_mf {
            let resolved = resolve_mf_index(index, record.mf_count, ImportKind::GetOrSet)?;
            (resolved, FieldValue::Mf(vec![value]))
        } else {
            (-1, FieldValue::Sf(value))
        };
        self.lock.with_locked(|state| {
            state.queue.submit_set(field, resolved_index, data);
        });
        Ok(())
    }

    /// Insert an element into an MF field at `index` (tail position
    /// legal). Round-trips immediately, returning the field's new
    /// element count.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if `value` fails well-formedness
    /// checks, is the wrong kind, the field is SF or PROTO-internal, or
    /// `index` is out of range.
    pub fn field_insert(&self, field: FieldHandle, index: i32, value: ScalarValue) -> Result<i32, ApiError> {
        self.assert_supervisor()?;
        validate_scalar(&value)?;
        let record = self.field_snapshot(field)?;
        if record.is_proto_internal {
            return Err(ValidationError::ProtoInternalReadOnly.into());
        }
        if !record.is_mf {
            return Err(ValidationError::WrongArity {
                expected_mf_desc: "insert requires an MF field",
            }
            .into());
        }
        if value.kind() != record.kind {
            return Err(ValidationError::WrongFieldKind {
                expected: record.kind,
                actual: value.kind(),
            }
            .into());
        }
        let resolved_index = resolve_mf_index(index, record.mf_count, ImportKind::Insert)?;
        self.lock.with_locked(|state| {
            state.queue.submit(FieldRequest {
                kind: RequestKind::Import,
                field,
                index: resolved_index,
                data: Some(FieldValue::Mf(vec![value])),
            });
        });
        self.flush()?;
        self.lock
            .with_locked(|state| state.registry.field(field).map(|r| r.mf_count))
            .ok_or(ApiError::StaleHandle)
    }

    /// Import an `SFNode`/`MFNode` element from a filename (`.wbo`, or
    /// `.wrl` only at the root's `children` field's tail position).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if the filename extension is
    /// unacceptable, a `.wrl` import isn't at the root children tail,
    /// the field isn't an MF node field, or `index` is out of range.
    pub fn field_import_node(&self, field: FieldHandle, index: i32, filename: &str) -> Result<i32, ApiError> {
        self.assert_supervisor()?;
        let record = self.field_snapshot(field)?;
        if record.is_proto_internal {
            return Err(ValidationError::ProtoInternalReadOnly.into());
        }
        if !record.is_mf || record.kind != ScalarKind::Node {
            return Err(ValidationError::WrongFieldKind {
                expected: ScalarKind::Node,
                actual: record.kind,
            }
            .into());
        }
        if filename.is_empty() {
            return Err(ValidationError::EmptyString.into());
        }
        let resolved_index = resolve_mf_index(index, record.mf_count, ImportKind::Insert)?;
        if filename.ends_with(".wrl") {
            if record.node_id != ROOT_NODE_ID || resolved_index != record.mf_count {
                return Err(ValidationError::WrlImportNotAtRootTail.into());
            }
        } else {
            validate_filename_extension(filename, &[".wbo"])?;
        }
        self.lock.with_locked(|state| {
            state.queue.submit(FieldRequest {
                kind: RequestKind::Import,
                field,
                index: resolved_index,
                data: Some(FieldValue::Mf(vec![ScalarValue::String(filename.to_string())])),
            });
        });
        self.flush()?;
        self.lock
            .with_locked(|state| state.registry.field(field).map(|r| r.mf_count))
            .ok_or(ApiError::StaleHandle)
    }

    /// Import a node from an in-memory textual node string.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if the field isn't an MF node
    /// field or `index` is out of range.
    pub fn field_import_node_from_string(
        &self,
        field: FieldHandle,
        index: i32,
        node_string: &str,
    ) -> Result<i32, ApiError> {
        self.assert_supervisor()?;
        let record = self.field_snapshot(field)?;
        if record.is_proto_internal {
            return Err(ValidationError::ProtoInternalReadOnly.into());
        }
        if !record.is_mf || record.kind != ScalarKind::Node {
            return Err(ValidationError::WrongFieldKind {
                expected: ScalarKind::Node,
                actual: record.kind,
            }
            .into());
        }
        if node_string.is_empty() {
            return Err(ValidationError::EmptyString.into());
        }
        let resolved_index = resolve_mf_index(index, record.mf_count, ImportKind::Insert)?;
        self.lock.with_locked(|state| {
            state.queue.submit(FieldRequest {
                kind: RequestKind::ImportFromString,
                field,
                index: resolved_index,
                data: Some(FieldValue::Mf(vec![ScalarValue::String(node_string.to_string())])),
            });
        });
        self.flush()?;
        self.lock
            .with_locked(|state| state.registry.field(field).map(|r| r.mf_count))
            .ok_or(ApiError::StaleHandle)
    }

    /// Remove one MF element at `index`. Round-trips immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if the field is SF, PROTO-
    /// internal, or `index` is out of range.
    pub fn field_remove(&self, field: FieldHandle, index: i32) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        let record = self.field_snapshot(field)?;
        if record.is_proto_internal {
            return Err(ValidationError::ProtoInternalReadOnly.into());
        }
        if !record.is_mf {
            return Err(ValidationError::WrongArity {
                expected_mf_desc: "remove requires an MF field",
            }
            .into());
        }
        let resolved_index = resolve_mf_index(index, record.mf_count, ImportKind::GetOrSet)?;
        self.lock.with_locked(|state| {
            state.queue.submit(FieldRequest {
                kind: RequestKind::Remove,
                field,
                index: resolved_index,
                data: None,
            });
        });
        self.flush()
    }

    // ---- Node removal & labels (spec §4.4 priority groups 4-5) ----

    /// Queue a node for removal on the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::StaleHandle`] if `node` is not live.
    pub fn node_remove(&self, node: NodeHandle) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        let id = self.node_id(node)?;
        self.lock.with_locked(|state| state.queue_removal(id));
        Ok(())
    }

    /// Set (or replace) an overlay label.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotSupervisor`] if the caller isn't the supervisor.
    pub fn label_set(&self, label: Label) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        self.lock.with_locked(|state| state.set_label(label));
        Ok(())
    }

    /// Remove a pending label by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotSupervisor`] if the caller isn't the supervisor.
    pub fn label_remove(&self, id: u16) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        self.lock.with_locked(|state| state.labels.retain(|l| l.id != id));
        Ok(())
    }

    // ---- One-shot physics (spec §4.4 priority group 6) ----

    /// Query global position, round-tripping unless already cached this step.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::StaleHandle`] if `node` is not live.
    pub fn node_get_position(&self, node: NodeHandle) -> Result<Option<[f64; 3]>, ApiError> {
        self.assert_supervisor()?;
        if let Some(cached) = self
            .lock
            .with_locked(|state| state.registry.node(node).map(|r| r.position))
        {
            if cached.is_some() {
                return Ok(cached);
            }
        } else {
            return Err(ApiError::StaleHandle);
        }
        let id = self.node_id(node)?;
        self.lock
            .with_locked(|state| state.one_shots.arm_one_shot(OneShot::GetPosition(id)));
        self.flush()?;
        self.lock
            .with_locked(|state| state.registry.node(node).map(|r| r.position))
            .ok_or(ApiError::StaleHandle)
    }

    /// Query orientation matrix, round-tripping unless already cached this step.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::StaleHandle`] if `node` is not live.
    pub fn node_get_orientation(&self, node: NodeHandle) -> Result<Option<[f64; 9]>, ApiError> {
        self.assert_supervisor()?;
        if let Some(cached) = self
            .lock
            .with_locked(|state| state.registry.node(node).map(|r| r.orientation))
        {
            if cached.is_some() {
                return Ok(cached);
            }
        } else {
            return Err(ApiError::StaleHandle);
        }
        let id = self.node_id(node)?;
        self.lock
            .with_locked(|state| state.one_shots.arm_one_shot(OneShot::GetOrientation(id)));
        self.flush()?;
        self.lock
            .with_locked(|state| state.registry.node(node).map(|r| r.orientation))
            .ok_or(ApiError::StaleHandle)
    }

    /// Query center of mass, round-tripping unless already cached this step.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::StaleHandle`] if `node` is not live.
    pub fn node_get_center_of_mass(&self, node: NodeHandle) -> Result<Option<[f64; 3]>, ApiError> {
        self.assert_supervisor()?;
        if let Some(cached) = self
            .lock
            .with_locked(|state| state.registry.node(node).map(|r| r.center_of_mass))
        {
            if cached.is_some() {
                return Ok(cached);
            }
        } else {
            return Err(ApiError::StaleHandle);
        }
        let id = self.node_id(node)?;
        self.lock
            .with_locked(|state| state.one_shots.arm_one_shot(OneShot::GetCenterOfMass(id)));
        self.flush()?;
        self.lock
            .with_locked(|state| state.registry.node(node).map(|r| r.center_of_mass))
            .ok_or(ApiError::StaleHandle)
    }

    /// Query linear+angular velocity.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::StaleHandle`] if `node` is not live.
    pub fn node_get_velocity(&self, node: NodeHandle) -> Result<Option<[f64; 6]>, ApiError> {
        self.assert_supervisor()?;
        if let Some(cached) = self
            .lock
            .with_locked(|state| state.registry.node(node).map(|r| r.solid_velocity))
        {
            if cached.is_some() {
                return Ok(cached);
            }
        } else {
            return Err(ApiError::StaleHandle);
        }
        let id = self.node_id(node)?;
        self.lock
            .with_locked(|state| state.one_shots.arm_one_shot(OneShot::GetVelocity(id)));
        self.flush()?;
        self.lock
            .with_locked(|state| state.registry.node(node).map(|r| r.solid_velocity))
            .ok_or(ApiError::StaleHandle)
    }

    /// Set linear+angular velocity.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if any component is non-finite.
    pub fn node_set_velocity(&self, node: NodeHandle, velocity: [f64; 6]) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        for component in velocity {
            validate_float(component)?;
        }
        let id = self.node_id(node)?;
        self.lock
            .with_locked(|state| state.one_shots.arm_one_shot(OneShot::SetVelocity { node: id, velocity }));
        self.flush()
    }

    /// Query contact points, optionally including descendant solids.
    /// Cached for the rest of the simulated step (spec §8 scenario 5).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::StaleHandle`] if `node` is not live.
    pub fn node_get_contact_points(
        &self,
        node: NodeHandle,
        include_descendants: bool,
    ) -> Result<(Vec<f64>, Vec<u32>), ApiError> {
        self.assert_supervisor()?;
        let cached = self
            .lock
            .with_locked(|state| {
                state.registry.node(node).map(|r| {
                    r.contact_points
                        .clone()
                        .zip(r.contact_point_node_ids.clone())
                })
            })
            .ok_or(ApiError::StaleHandle)?;
        if let Some(pair) = cached {
            return Ok(pair);
        }
        let id = self.node_id(node)?;
        self.lock.with_locked(|state| {
            state.one_shots.arm_one_shot(OneShot::GetContactPoints {
                node: id,
                include_descendants,
            });
        });
        self.flush()?;
        self.lock
            .with_locked(|state| {
                state.registry.node(node).map(|r| {
                    (
                        r.contact_points.clone().unwrap_or_default(),
                        r.contact_point_node_ids.clone().unwrap_or_default(),
                    )
                })
            })
            .ok_or(ApiError::StaleHandle)
    }

    /// Query static-balance flag.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::StaleHandle`] if `node` is not live.
    pub fn node_get_static_balance(&self, node: NodeHandle) -> Result<Option<bool>, ApiError> {
        self.assert_supervisor()?;
        if let Some(cached) = self
            .lock
            .with_locked(|state| state.registry.node(node).map(|r| r.static_balance))
        {
            if cached.is_some() {
                return Ok(cached);
            }
        } else {
            return Err(ApiError::StaleHandle);
        }
        let id = self.node_id(node)?;
        self.lock
            .with_locked(|state| state.one_shots.arm_one_shot(OneShot::GetStaticBalance(id)));
        self.flush()?;
        self.lock
            .with_locked(|state| state.registry.node(node).map(|r| r.static_balance))
            .ok_or(ApiError::StaleHandle)
    }

    /// Restart the calling controller process.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotSupervisor`] if the caller isn't the supervisor.
    pub fn controller_restart(&self) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        self.lock.with_locked(|state| state.one_shots.arm_one_shot(OneShot::RestartController));
        self.flush()
    }

    /// Toggle a node's visibility for a given viewer node.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::StaleHandle`] if either handle is stale.
    pub fn node_set_visibility(&self, node: NodeHandle, viewer: NodeHandle, visible: bool) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        let node_id = self.node_id(node)?;
        let viewer_id = self.node_id(viewer)?;
        self.lock.with_locked(|state| {
            state.one_shots.arm_one_shot(OneShot::SetVisibility {
                node: node_id,
                viewer: viewer_id,
                visible,
            });
        });
        self.flush()
    }

    /// Move the 3D viewpoint to frame a node.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::StaleHandle`] if `node` is not live.
    pub fn node_move_viewpoint(&self, node: NodeHandle) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        let id = self.node_id(node)?;
        self.lock.with_locked(|state| state.one_shots.arm_one_shot(OneShot::MoveViewpoint(id)));
        self.flush()
    }

    /// Apply a force at a node's origin.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if any component is non-finite.
    pub fn node_add_force(&self, node: NodeHandle, force: [f64; 3], relative: bool) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        for component in force {
            validate_float(component)?;
        }
        let id = self.node_id(node)?;
        self.lock
            .with_locked(|state| state.one_shots.arm_one_shot(OneShot::AddForce { node: id, force, relative }));
        self.flush()
    }

    /// Apply a force at an offset from a node's origin.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if any component is non-finite.
    pub fn node_add_force_with_offset(
        &self,
        node: NodeHandle,
        force: [f64; 3],
        offset: [f64; 3],
        relative: bool,
    ) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        for component in force.into_iter().chain(offset) {
            validate_float(component)?;
        }
        let id = self.node_id(node)?;
        self.lock.with_locked(|state| {
            state.one_shots.arm_one_shot(OneShot::AddForceWithOffset {
                node: id,
                force,
                offset,
                relative,
            });
        });
        self.flush()
    }

    /// Apply a torque.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if any component is non-finite.
    pub fn node_add_torque(&self, node: NodeHandle, torque: [f64; 3], relative: bool) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        for component in torque {
            validate_float(component)?;
        }
        let id = self.node_id(node)?;
        self.lock
            .with_locked(|state| state.one_shots.arm_one_shot(OneShot::AddTorque { node: id, torque, relative }));
        self.flush()
    }

    // ---- Session capture / export (spec §4.4 priority group 7) ----

    /// Export the current view to an image file.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if `filename` is empty.
    pub fn export_image(&self, filename: &str, quality: u8) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        if filename.is_empty() {
            return Err(ValidationError::EmptyString.into());
        }
        self.lock
            .with_locked(|state| state.session.export_image = Some((filename.to_string(), quality)));
        Ok(())
    }

    /// Begin recording a movie.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if the filename is empty.
    pub fn movie_start(&self, request: MovieStartRequest) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        if request.filename.is_empty() {
            return Err(ValidationError::EmptyString.into());
        }
        self.lock.with_locked(|state| state.session.movie_start = Some(request));
        Ok(())
    }

    /// Stop the in-progress movie recording.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotSupervisor`] if the caller isn't the supervisor.
    pub fn movie_stop(&self) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        self.lock.with_locked(|state| state.session.movie_stop = true);
        Ok(())
    }

    /// Begin recording an HTML animation. `filename` must end in `.html`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if the extension is unacceptable.
    pub fn animation_start(&self, filename: &str) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        validate_filename_extension(filename, &[".html"])?;
        self.lock.with_locked(|state| state.session.animation_start = Some(filename.to_string()));
        Ok(())
    }

    /// Stop the in-progress animation recording.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotSupervisor`] if the caller isn't the supervisor.
    pub fn animation_stop(&self) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        self.lock.with_locked(|state| state.session.animation_stop = true);
        Ok(())
    }

    /// Save the current world, optionally to a new filename (`.wbt`).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if `filename` is given but has
    /// the wrong extension.
    pub fn save_world(&self, filename: Option<&str>) -> Result<(), ApiError> {
        self.assert_supervisor()?;
        if let Some(name) = filename {
            validate_filename_extension(name, &[".wbt"])?;
        }
        self.lock
            .with_locked(|state| state.session.save_world = Some(filename.map(String::from)));
        Ok(())
    }

    /// Query VR-headset pose/state, round-tripping immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if no reply is received.
    pub fn vr_headset_query(&self) -> Result<Vec<u8>, ApiError> {
        self.assert_supervisor()?;
        self.lock.with_locked(|state| {
            state.session.vr_query = true;
            state.vr_reply = None;
        });
        self.flush()?;
        self.lock
            .with_locked(|state| state.vr_reply.clone())
            .ok_or_else(|| ApiError::Transport("no VR headset reply received".into()))
    }

    /// Last-polled movie capture status, if any `START_MOVIE` has run.
    #[must_use]
    pub fn movie_status(&self) -> Option<MovieStatus> {
        self.lock.with_locked(|state| state.movie_state.as_ref().map(|m| m.status))
    }

    /// Last-polled animation capture status, if any recording has run.
    #[must_use]
    pub fn animation_status(&self) -> Option<MovieStatus> {
        self.lock.with_locked(|state| state.animation_state.as_ref().map(|a| a.status))
    }

    /// Last-polled world-save completion status.
    #[must_use]
    pub fn save_succeeded(&self) -> Option<bool> {
        self.lock.with_locked(|state| state.save_state.as_ref().map(|s| s.succeeded))
    }

    // ---- Spec-named sentinel-returning typed accessors (spec §7) ----

    /// Fetch an `SFBool` field's value, or `false` on any failure.
    #[must_use]
    pub fn get_sf_bool(&self, field: FieldHandle) -> bool {
        let result: Result<bool, ApiError> = (|| {
            let record = self.field_snapshot(field)?;
            if record.kind != ScalarKind::Bool || record.is_mf {
                return Err(ValidationError::WrongFieldKind {
                    expected: ScalarKind::Bool,
                    actual: record.kind,
                }
                .into());
            }
            Ok(self.field_get(field, -1)?.as_bool().unwrap_or(false))
        })();
        self.sentinel(result, false)
    }

    /// Overwrite an `SFBool` field's value, logging and doing nothing on failure.
    pub fn set_sf_bool(&self, field: FieldHandle, value: bool) {
        if let Err(err) = self.field_set(field, -1, ScalarValue::Bool(value)) {
            self.log_error(&err);
        }
    }

    /// Fetch one element of an `MFFloat` field, or `NaN` on any failure.
    #[must_use]
    pub fn get_mf_float(&self, field: FieldHandle, index: i32) -> f64 {
        let result: Result<f64, ApiError> = (|| {
            let record = self.field_snapshot(field)?;
            if record.kind != ScalarKind::Float || !record.is_mf {
                return Err(ValidationError::WrongFieldKind {
                    expected: ScalarKind::Float,
                    actual: record.kind,
                }
                .into());
            }
            Ok(self.field_get(field, index)?.as_float().unwrap_or(f64::NAN))
        })();
        self.sentinel(result, f64::NAN)
    }

    /// Overwrite one element of an `MFFloat` field, logging on failure.
    pub fn set_mf_float(&self, field: FieldHandle, index: i32, value: f64) {
        if let Err(err) = self.field_set(field, index, ScalarValue::Float(value)) {
            self.log_error(&err);
        }
    }

    /// Import a node into an `MFNode` field from a filename, returning
    /// the field's new count or `-1` on failure.
    #[must_use]
    pub fn import_mf_node(&self, field: FieldHandle, index: i32, filename: &str) -> i32 {
        let result = self.field_import_node(field, index, filename);
        self.sentinel(result, -1)
    }

    /// Number of contact points currently cached for `node`, or `-1` on failure.
    #[must_use]
    pub fn get_number_of_contact_points(&self, node: NodeHandle, include_descendants: bool) -> i32 {
        let result = self
            .node_get_contact_points(node, include_descendants)
            .map(|(points, _)| i32::try_from(points.len() / 3).unwrap_or(i32::MAX));
        self.sentinel(result, -1)
    }

    /// Begin an HTML animation recording, returning whether it was accepted.
    #[must_use]
    pub fn animation_start_recording(&self, filename: &str) -> bool {
        self.sentinel(self.animation_start(filename).map(|()| true), false)
    }

    /// Whether the most recent movie/animation capture ended in failure.
    #[must_use]
    pub fn movie_failed(&self) -> bool {
        self.movie_status().is_some_and(MovieStatus::is_failure)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use supervisor_wire::VectorKind3;
    use supervisor_wire::ServerEvent;

    fn resolved_node_api() -> (SupervisorApi<MockTransport>, NodeHandle, FieldHandle) {
        let api = SupervisorApi::new(SupervisorConfig::default(), MockTransport::new());
        api.transport.lock().unwrap().push_reply(vec![ServerEvent::NodeResolved {
            uid: 7,
            type_tag: 1,
            parent_id: -1,
        }]);
        let node = api.node_get_from_def("ROBOT.BODY", None).unwrap().unwrap();
        api.transport.lock().unwrap().push_reply(vec![ServerEvent::FieldResolved {
            field_ref: 3,
            kind: Some((ScalarKind::Bool, false)),
            mf_count: -1,
        }]);
        let field = api.field_get_from_name(node, "enabled", false).unwrap().unwrap();
        (api, node, field)
    }

    #[test]
    fn non_supervisor_role_is_rejected() {
        let api = SupervisorApi::new(SupervisorConfig::non_supervisor(), MockTransport::new());
        assert_eq!(api.quit(0), Err(ApiError::NotSupervisor));
    }

    #[test]
    fn repeated_def_lookup_performs_no_second_round_trip() {
        let (api, node, _field) = resolved_node_api();
        let frames_before = api.transport.lock().unwrap().frame_count();
        let again = api.node_get_from_def("ROBOT.BODY", None).unwrap();
        assert_eq!(again, Some(node));
        assert_eq!(api.transport.lock().unwrap().frame_count(), frames_before);
    }

    #[test]
    fn set_then_get_coalesces_with_zero_frames() {
        let (api, _node, field) = resolved_node_api();
        let frames_before = api.transport.lock().unwrap().frame_count();
        api.field_set(field, -1, ScalarValue::Bool(true)).unwrap();
        let value = api.field_get(field, -1).unwrap();
        assert_eq!(value, ScalarValue::Bool(true));
        assert_eq!(api.transport.lock().unwrap().frame_count(), frames_before);
    }

    #[test]
    fn set_sf_bool_then_get_sf_bool_matches_scenario_one() {
        let (api, _node, field) = resolved_node_api();
        api.set_sf_bool(field, true);
        assert!(api.get_sf_bool(field));
    }

    #[test]
    fn second_get_while_in_flight_is_rejected() {
        let (api, _node, field) = resolved_node_api();
        api.get_in_flight.store(true, Ordering::SeqCst);
        assert_eq!(api.field_get(field, -1), Err(ApiError::GetAlreadyInFlight));
    }

    #[test]
    fn animation_extension_validation_matches_scenario_six() {
        let api = SupervisorApi::new(SupervisorConfig::default(), MockTransport::new());
        assert!(!api.animation_start_recording("/tmp/a.mp4"));
        assert!(api.animation_start_recording("/tmp/a.html"));
    }

    #[test]
    fn node_removal_resets_dependent_parent_id() {
        let api = SupervisorApi::new(SupervisorConfig::default(), MockTransport::new());
        let (parent, child) = api.lock.with_locked(|state| {
            let parent = state.registry.add_node(5, 1, 0, None);
            let child = state.registry.add_node(6, 1, 5, None);
            (parent, child)
        });
        api.node_remove(parent).unwrap();
        api.lock.with_locked(|state| {
            state.registry.remove_node(parent);
        });
        assert_eq!(api.lock.with_locked(|state| state.registry.find_node_by_id(5)), None);
        assert_eq!(api.lock.with_locked(|state| state.registry.node(child).unwrap().parent_id), -1);
    }

    #[test]
    fn contact_points_cache_within_a_step_performs_one_round_trip() {
        let (api, node, _field) = resolved_node_api();
        api.transport.lock().unwrap().push_reply(vec![ServerEvent::ContactPoints {
            node: 7,
            points: vec![1.0, 2.0, 3.0],
            point_node_ids: vec![42],
            time_stamp: 0.1,
        }]);
        let frames_before = api.transport.lock().unwrap().frame_count();
        let first = api.node_get_contact_points(node, true).unwrap();
        assert_eq!(first.0.len(), 3);
        let second = api.node_get_contact_points(node, true).unwrap();
        assert_eq!(second, first);
        assert_eq!(api.transport.lock().unwrap().frame_count(), frames_before + 1);
    }

    #[test]
    fn begin_step_clears_cached_contact_points() {
        let (api, node, _field) = resolved_node_api();
        api.transport.lock().unwrap().push_reply(vec![ServerEvent::ContactPoints {
            node: 7,
            points: vec![1.0, 2.0, 3.0],
            point_node_ids: vec![42],
            time_stamp: 0.1,
        }]);
        api.node_get_contact_points(node, true).unwrap();
        api.begin_step();
        assert!(api
            .lock
            .with_locked(|state| state.registry.node(node).unwrap().contact_points.clone())
            .is_none());
    }

    #[test]
    fn mf_negative_index_matches_tail_element() {
        let (api, _node, field) = resolved_node_api();
        api.lock.with_locked(|state| {
            let record = state.registry.field_mut(field).unwrap();
            record.kind = ScalarKind::Float;
            record.is_mf = true;
            record.mf_count = 4;
        });
        api.transport.lock().unwrap().push_reply(vec![ServerEvent::FieldValue {
            node: 7,
            field: 3,
            kind: ScalarKind::Float,
            is_mf: true,
            elements: vec![ScalarValue::Float(9.5)],
        }]);
        let tail = api.get_mf_float(field, 3);
        assert!((tail - 9.5).abs() < f64::EPSILON);
        api.transport.lock().unwrap().push_reply(vec![ServerEvent::FieldValue {
            node: 7,
            field: 3,
            kind: ScalarKind::Float,
            is_mf: true,
            elements: vec![ScalarValue::Float(9.5)],
        }]);
        let via_negative = api.get_mf_float(field, -1);
        assert!((via_negative - 9.5).abs() < f64::EPSILON);
    }

    #[test]
    fn node_get_position_reports_absent_data_as_none() {
        let (api, node, _field) = resolved_node_api();
        api.transport.lock().unwrap().push_reply(vec![ServerEvent::Vector3 {
            node: 7,
            which: VectorKind3::Position,
            value: None,
        }]);
        let position = api.node_get_position(node).unwrap();
        assert!(position.is_none());
    }
}
