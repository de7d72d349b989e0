// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Frame assembly and reply dispatch (spec §4.4 frame writer, §4.5
//! frame reader).
//!
//! Assembly follows the fixed priority order the spec requires: at
//! most one scene action, then the armed resolution request, then
//! every queued field request in FIFO order, then labels, then
//! removals, then the armed one-shot, then session actions. The
//! reader is the writer's mirror: it walks a decoded reply batch and
//! applies each [`ServerEvent`] back onto [`SupervisorState`].

use supervisor_types::{AnimationState, FieldRecord, MovieState, NodeRecord, SaveState, ScalarValue};
use supervisor_wire::{encode_item, ByteWriter, OutboundItem, ResolutionRequest, ServerEvent, VectorKind3};
use tracing::warn;

use crate::state::SupervisorState;

/// Serialize the current frame's worth of pending work from `state`, in
/// priority order, into one byte buffer.
#[must_use]
pub fn write_frame(state: &SupervisorState) -> Vec<u8> {
    let mut w = ByteWriter::new();

    if let Some(action) = &state.scene_action {
        encode_item(&mut w, &OutboundItem::Scene(action));
    }

    if let Some(resolution) = state.one_shots.peek_resolution() {
        encode_item(&mut w, &OutboundItem::Resolution(resolution));
    }

    for request in state.queue.iter() {
        let Some(field) = state.registry.field(request.field) else {
            warn!("dropping frame item for stale field handle");
            continue;
        };
        encode_item(
            &mut w,
            &OutboundItem::Field {
                node: field.node_id,
                field: field.field_id,
                kind: field.kind,
                proto_internal: field.is_proto_internal,
                request,
            },
        );
    }

    for label in &state.labels {
        encode_item(&mut w, &OutboundItem::Label(label));
    }

    for node_id in &state.pending_removals {
        encode_item(&mut w, &OutboundItem::RemoveNode(*node_id));
    }

    if let Some(one_shot) = state.one_shots.peek_one_shot() {
        encode_item(&mut w, &OutboundItem::OneShot(one_shot));
    }

    for action in session_actions(state) {
        encode_item(&mut w, &OutboundItem::Session(&action));
    }

    w.into_bytes()
}

fn session_actions(state: &SupervisorState) -> Vec<supervisor_wire::SessionAction> {
    use supervisor_wire::SessionAction;
    let mut actions = Vec::new();
    if let Some((filename, quality)) = &state.session.export_image {
        actions.push(SessionAction::ExportImage {
            filename: filename.clone(),
            quality: *quality,
        });
    }
    if let Some(req) = &state.session.movie_start {
        actions.push(SessionAction::StartMovie {
            filename: req.filename.clone(),
            width: req.width,
            height: req.height,
            codec: req.codec,
            quality: req.quality,
            accelerated: req.accelerated,
            caption: req.caption,
        });
    }
    if state.session.movie_stop {
        actions.push(SessionAction::StopMovie);
    }
    if let Some(filename) = &state.session.animation_start {
        actions.push(SessionAction::StartAnimation(filename.clone()));
    }
    if state.session.animation_stop {
        actions.push(SessionAction::StopAnimation);
    }
    if let Some(filename) = &state.session.save_world {
        actions.push(SessionAction::SaveWorld(filename.clone()));
    }
    if state.session.vr_query {
        actions.push(SessionAction::VrHeadsetQuery);
    }
    actions
}

/// Clear every per-frame request after a flush completed, leaving
/// persistent registry/session state untouched (spec §4.4: the
/// request queue, armed slots, labels, and removals are all one-shot
/// per frame).
pub fn clear_frame(state: &mut SupervisorState) {
    state.queue.drain().for_each(drop);
    state.scene_action = None;
    state.labels.clear();
    state.pending_removals.clear();
    state.session = supervisor_types::SessionState::default();
}

/// Apply one decoded reply to `state` (spec §4.5 per-opcode actions).
pub fn apply_event(state: &mut SupervisorState, event: ServerEvent) {
    match event {
        ServerEvent::Configure {
            self_node_id,
            is_proto_internal,
        } => {
            let handle = state.registry.add_node(self_node_id, 0, -1, None);
            if let Some(record) = state.registry.node_mut(handle) {
                record.is_proto_internal = is_proto_internal;
            }
            state.self_node = Some(handle);
        }
        ServerEvent::NodeResolved {
            uid,
            type_tag,
            parent_id,
        } => {
            if let Some(resolution) = state.one_shots.take_resolution() {
                if uid == 0 {
                    state.last_resolved_node = None;
                } else {
                    let def_expr = match &resolution {
                        ResolutionRequest::NodeByDef { def, .. } => Some(def.as_str()),
                        _ => None,
                    };
                    let handle = state.registry.add_node(uid, type_tag, parent_id, def_expr);
                    if let ResolutionRequest::NodeByDef { proto_scope_id, .. } = &resolution {
                        #[allow(clippy::cast_sign_loss)]
                        let proto_handle = (*proto_scope_id >= 0)
                            .then(|| state.registry.find_node_by_id(*proto_scope_id as u32))
                            .flatten();
                        if let Some(record) = state.registry.node_mut(handle) {
                            record.parent_proto = proto_handle;
                        }
                    }
                    state.last_resolved_node = Some(handle);
                }
            }
        }
        ServerEvent::FieldResolved {
            field_ref,
            kind,
            mf_count,
        } => {
            if let Some(ResolutionRequest::FieldByName { node, name, .. }) =
                state.one_shots.take_resolution()
            {
                state.last_resolved_field = if field_ref >= 0 {
                    kind.map(|(scalar_kind, is_mf)| {
                        #[allow(clippy::cast_sign_loss)]
                        let field_id = field_ref as u32;
                        let record = FieldRecord::new(name, node, field_id, scalar_kind, is_mf, mf_count, false);
                        state.registry.add_field(record)
                    })
                } else {
                    None
                };
            }
        }
        ServerEvent::FieldValue {
            node,
            field,
            is_mf,
            elements,
            ..
        } => {
            for element in &elements {
                if let ScalarValue::Node(uid) = *element {
                    if uid != 0 {
                        state.registry.add_node(uid, 0, -1, None);
                    }
                }
            }
            if let Some(handle) = state.registry.find_field_by_ids(node, field) {
                if let Some(record) = state.registry.field_mut(handle) {
                    record.last_value = Some(if is_mf {
                        supervisor_types::FieldValue::Mf(elements)
                    } else {
                        supervisor_types::FieldValue::Sf(
                            elements.into_iter().next().unwrap_or(ScalarValue::Bool(false)),
                        )
                    });
                }
            }
        }
        ServerEvent::NodeRegenerated => state.registry.remove_internal_proto_entries(),
        ServerEvent::FieldInserted { node, field, inserted_count } => {
            if let Some(handle) = state.registry.find_field_by_ids(node, field) {
                if let Some(record) = state.registry.field_mut(handle) {
                    record.mf_count = inserted_count;
                }
            }
        }
        ServerEvent::NodeRemoved { node, parent_field_count } => {
            if let Some(handle) = state.registry.find_node_by_id(node) {
                state.registry.remove_node(handle);
            }
            for field in state.registry.fields_mut() {
                let holds_removed_node = matches!(
                    &field.last_value,
                    Some(supervisor_types::FieldValue::Mf(values))
                        if values.iter().any(|v| matches!(v, ScalarValue::Node(id) if *id == node))
                );
                if holds_removed_node {
                    field.mf_count = parent_field_count;
                }
            }
        }
        ServerEvent::Vector3 { node, which, value } => {
            apply_node_cache(state, node, |record: &mut NodeRecord| match which {
                VectorKind3::Position => record.position = value,
                VectorKind3::CenterOfMass => record.center_of_mass = value,
            });
            state.one_shots.take_one_shot();
        }
        ServerEvent::Orientation { node, value } => {
            apply_node_cache(state, node, |record| record.orientation = value);
            state.one_shots.take_one_shot();
        }
        ServerEvent::Velocity { node, value } => {
            apply_node_cache(state, node, |record| record.solid_velocity = value);
            state.one_shots.take_one_shot();
        }
        ServerEvent::ContactPoints {
            node,
            points,
            point_node_ids,
            time_stamp,
        } => {
            apply_node_cache(state, node, move |record| {
                record.contact_points = Some(points);
                record.contact_point_node_ids = Some(point_node_ids);
                record.contact_points_time_stamp = Some(time_stamp);
            });
            state.one_shots.take_one_shot();
        }
        ServerEvent::StaticBalance { node, value } => {
            apply_node_cache(state, node, |record| record.static_balance = Some(value));
            state.one_shots.take_one_shot();
        }
        ServerEvent::MovieStatusUpdate(status) => state.movie_state = Some(MovieState { status }),
        ServerEvent::AnimationStatusUpdate(status) => {
            state.animation_state = Some(AnimationState { status });
        }
        ServerEvent::SaveStatusUpdate { succeeded } => {
            state.save_state = Some(SaveState { succeeded });
        }
        ServerEvent::VrHeadsetReply { payload } => state.vr_reply = Some(payload),
        ServerEvent::Unrecognized { opcode, .. } => {
            warn!(opcode, "unrecognized reply opcode; ignoring");
        }
    }
}

fn apply_node_cache(state: &mut SupervisorState, node_id: u32, f: impl FnOnce(&mut NodeRecord)) {
    if let Some(handle) = state.registry.find_node_by_id(node_id) {
        if let Some(record) = state.registry.node_mut(handle) {
            f(record);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::state::SupervisorState;
    use supervisor_types::ScalarKind;

    #[test]
    fn configure_sets_self_node() {
        let mut state = SupervisorState::new();
        apply_event(
            &mut state,
            ServerEvent::Configure {
                self_node_id: 9,
                is_proto_internal: false,
            },
        );
        assert!(state.self_node.is_some());
        assert_eq!(state.registry.find_node_by_id(9), state.self_node);
    }

    #[test]
    fn node_resolved_by_def_records_def_name() {
        let mut state = SupervisorState::new();
        state.one_shots.arm_resolution(ResolutionRequest::NodeByDef {
            def: "ROBOT.BODY".into(),
            proto_scope_id: -1,
        });
        apply_event(
            &mut state,
            ServerEvent::NodeResolved {
                uid: 5,
                type_tag: 1,
                parent_id: -1,
            },
        );
        let handle = state.registry.find_node_by_id(5).unwrap();
        assert_eq!(state.registry.node(handle).unwrap().def_name.as_deref(), Some("BODY"));
    }

    #[test]
    fn node_regenerated_purges_proto_internal_nodes() {
        let mut state = SupervisorState::new();
        let handle = state.registry.add_node(3, 1, 0, None);
        state.registry.node_mut(handle).unwrap().is_proto_internal = true;
        apply_event(&mut state, ServerEvent::NodeRegenerated);
        assert!(!state.registry.is_node_ref_valid(handle));
    }

    #[test]
    fn field_value_updates_cached_record() {
        let mut state = SupervisorState::new();
        let field = state.registry.add_field(FieldRecord::new(
            "translation".into(),
            1,
            2,
            ScalarKind::Vec3f,
            false,
            -1,
            false,
        ));
        apply_event(
            &mut state,
            ServerEvent::FieldValue {
                node: 1,
                field: 2,
                kind: ScalarKind::Vec3f,
                is_mf: false,
                elements: vec![ScalarValue::Vec3f([1.0, 2.0, 3.0])],
            },
        );
        let record = state.registry.field(field).unwrap();
        assert_eq!(
            record.last_value,
            Some(supervisor_types::FieldValue::Sf(ScalarValue::Vec3f([1.0, 2.0, 3.0])))
        );
    }

    #[test]
    fn field_value_with_node_elements_registers_referenced_nodes() {
        let mut state = SupervisorState::new();
        state.registry.add_field(FieldRecord::new(
            "children".into(),
            1,
            2,
            ScalarKind::Node,
            true,
            1,
            false,
        ));
        apply_event(
            &mut state,
            ServerEvent::FieldValue {
                node: 1,
                field: 2,
                kind: ScalarKind::Node,
                is_mf: true,
                elements: vec![ScalarValue::Node(42)],
            },
        );
        assert!(state.registry.find_node_by_id(42).is_some());
    }

    #[test]
    fn node_removed_reconciles_parent_field_mf_count() {
        let mut state = SupervisorState::new();
        let field = state.registry.add_field(FieldRecord::new(
            "children".into(),
            1,
            2,
            ScalarKind::Node,
            true,
            2,
            false,
        ));
        state.registry.field_mut(field).unwrap().last_value =
            Some(supervisor_types::FieldValue::Mf(vec![ScalarValue::Node(42), ScalarValue::Node(43)]));
        state.registry.add_node(42, 1, 1, None);
        apply_event(
            &mut state,
            ServerEvent::NodeRemoved {
                node: 42,
                parent_field_count: 1,
            },
        );
        assert!(state.registry.find_node_by_id(42).is_none());
        assert_eq!(state.registry.field(field).unwrap().mf_count, 1);
    }

    #[test]
    fn write_frame_then_clear_empties_all_per_frame_state() {
        let mut state = SupervisorState::new();
        state.scene_action = Some(supervisor_types::SceneAction::ResetPhysics);
        let frame = write_frame(&state);
        assert!(!frame.is_empty());
        clear_frame(&mut state);
        assert!(state.scene_action.is_none());
        assert!(state.queue.is_empty());
    }
}
