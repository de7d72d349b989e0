// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Outbound request encoding (spec §4.4 frame writer, §6 wire table).
//!
//! [`OutboundItem`] is one emittable unit; `encode_item` writes its
//! opcode byte followed by its payload. The frame assembly order
//! itself (priority groups 1-7) is `supervisor-client`'s job — this
//! module only knows how to serialize one item at a time.

use alloc::string::String;

use supervisor_types::{FieldRequest, Label, RequestKind, SceneAction, ScalarKind, SimulationMode};

use crate::cursor::ByteWriter;
use crate::opcode::RequestOpcode;

/// Which ambient resolution request is armed for the next frame (spec
/// §4.4 priority group 2 — at most one of these may be pending).
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionRequest {
    /// Resolve a node by server-assigned id.
    NodeById(u32),
    /// Resolve a node by dotted DEF-name expression and PROTO scope id.
    NodeByDef {
        /// Fully dotted DEF expression as given by the caller.
        def: String,
        /// PROTO scope to qualify the lookup with.
        proto_scope_id: i32,
    },
    /// Resolve a node by device tag.
    NodeByTag(i32),
    /// Resolve the currently selected node in the scene tree GUI.
    NodeSelected,
    /// Resolve a field by name on a known node.
    FieldByName {
        /// Owning node id.
        node: u32,
        /// Field name.
        name: String,
        /// Whether PROTO-internal fields may be returned.
        allow_proto: bool,
    },
}

/// A one-shot physics/session query or action (spec §4.4 priority
/// group 6-7). Not exhaustive of all ~130 API operations — the wire
/// shapes that differ only in opcode and a fixed argument list (e.g.
/// the three add-force variants) share one encoder parameterized by
/// opcode.
#[derive(Debug, Clone, PartialEq)]
pub enum OneShot {
    /// Query global position.
    GetPosition(u32),
    /// Query orientation matrix.
    GetOrientation(u32),
    /// Query center of mass.
    GetCenterOfMass(u32),
    /// Query contact points, optionally including descendants.
    GetContactPoints {
        /// Target node id.
        node: u32,
        /// Whether to include descendant solids' contact points.
        include_descendants: bool,
    },
    /// Query static-balance flag.
    GetStaticBalance(u32),
    /// Query linear+angular velocity.
    GetVelocity(u32),
    /// Set linear+angular velocity.
    SetVelocity {
        /// Target node id.
        node: u32,
        /// `[vx, vy, vz, wx, wy, wz]`.
        velocity: [f64; 6],
    },
    /// Reset physics for the whole simulation.
    ResetPhysics,
    /// Restart the calling controller process.
    RestartController,
    /// Toggle a node's visibility for a given viewer node.
    SetVisibility {
        /// Target node id.
        node: u32,
        /// Viewer node id this visibility applies to.
        viewer: u32,
        /// Whether the node should be visible.
        visible: bool,
    },
    /// Move the 3D viewpoint to frame a node.
    MoveViewpoint(u32),
    /// Apply a force at a node's origin.
    AddForce {
        /// Target node id.
        node: u32,
        /// Force vector.
        force: [f64; 3],
        /// Whether the force is expressed in the node's local frame.
        relative: bool,
    },
    /// Apply a force at an offset from a node's origin.
    AddForceWithOffset {
        /// Target node id.
        node: u32,
        /// Force vector.
        force: [f64; 3],
        /// Offset from the node origin the force is applied at.
        offset: [f64; 3],
        /// Whether force and offset are expressed in the node's local frame.
        relative: bool,
    },
    /// Apply a torque.
    AddTorque {
        /// Target node id.
        node: u32,
        /// Torque vector.
        torque: [f64; 3],
        /// Whether the torque is expressed in the node's local frame.
        relative: bool,
    },
}

/// A session-wide capture/export action (spec §4.4 priority group 7).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Export the current view to an image file.
    ExportImage {
        /// Output filename.
        filename: String,
        /// Encoding quality, `0..=100`.
        quality: u8,
    },
    /// Begin recording a movie.
    StartMovie {
        /// Output filename.
        filename: String,
        /// Frame width in pixels.
        width: i32,
        /// Frame height in pixels.
        height: i32,
        /// Server-defined codec identifier.
        codec: u8,
        /// Encoding quality, `0..=100`.
        quality: u8,
        /// Whether to use hardware acceleration.
        accelerated: bool,
        /// Whether to burn in an on-screen caption.
        caption: bool,
    },
    /// Stop the in-progress movie recording.
    StopMovie,
    /// Begin recording an HTML animation to `filename`.
    StartAnimation(String),
    /// Stop the in-progress animation recording.
    StopAnimation,
    /// Save the current world, optionally to a new filename.
    SaveWorld(Option<String>),
    /// Poll VR-headset pose/state.
    VrHeadsetQuery,
}

/// One item the frame writer may emit this step.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundItem<'a> {
    /// Priority 1: the mutually-exclusive scene action.
    Scene(&'a SceneAction),
    /// Priority 2: the armed resolution request.
    Resolution(&'a ResolutionRequest),
    /// Priority 3: one queued field request.
    Field {
        /// Owning node id.
        node: u32,
        /// Server-assigned field id.
        field: u32,
        /// The field's scalar kind (needed to size the SET/INSERT payload).
        kind: ScalarKind,
        /// `true` if this is the PROTO-internal read-only flag (carried
        /// through so the server can re-validate).
        proto_internal: bool,
        /// The queued request itself.
        request: &'a FieldRequest,
    },
    /// Priority 4: one pending label.
    Label(&'a Label),
    /// Priority 5: a node removal.
    RemoveNode(u32),
    /// Priority 6: a one-shot physics/session query or action.
    OneShot(&'a OneShot),
    /// Priority 7: a session capture/export action.
    Session(&'a SessionAction),
}

fn encode_scene_action(w: &mut ByteWriter, action: &SceneAction) {
    match action {
        SceneAction::ModeChange(mode) => {
            w.u8(RequestOpcode::ModeChange.wire_tag());
            w.u8(match mode {
                SimulationMode::Pause => 0,
                SimulationMode::RealTime => 1,
                SimulationMode::Fast => 2,
            });
        }
        SceneAction::Quit(status) => {
            w.u8(RequestOpcode::Quit.wire_tag());
            w.i32(*status);
        }
        SceneAction::Reset => w.u8(RequestOpcode::Reset.wire_tag()),
        SceneAction::ResetPhysics => w.u8(RequestOpcode::ResetPhysics.wire_tag()),
        SceneAction::Reload => w.u8(RequestOpcode::Reload.wire_tag()),
        SceneAction::LoadWorld(filename) => {
            w.u8(RequestOpcode::LoadWorld.wire_tag());
            w.string(filename);
        }
    }
}

fn encode_resolution(w: &mut ByteWriter, req: &ResolutionRequest) {
    match req {
        ResolutionRequest::NodeById(id) => {
            w.u8(RequestOpcode::NodeGetFromId.wire_tag());
            w.u32(*id);
        }
        ResolutionRequest::NodeByDef { def, proto_scope_id } => {
            w.u8(RequestOpcode::NodeGetFromDef.wire_tag());
            w.string(def);
            w.i32(*proto_scope_id);
        }
        ResolutionRequest::NodeByTag(tag) => {
            w.u8(RequestOpcode::NodeGetFromTag.wire_tag());
            w.i32(*tag);
        }
        ResolutionRequest::NodeSelected => w.u8(RequestOpcode::NodeGetSelected.wire_tag()),
        ResolutionRequest::FieldByName {
            node,
            name,
            allow_proto,
        } => {
            w.u8(RequestOpcode::FieldGetFromName.wire_tag());
            w.u32(*node);
            w.string(name);
            w.bool(*allow_proto);
        }
    }
}

fn encode_field_request(
    w: &mut ByteWriter,
    node: u32,
    field: u32,
    kind: ScalarKind,
    proto_internal: bool,
    request: &FieldRequest,
) {
    match request.kind {
        RequestKind::Get => {
            w.u8(RequestOpcode::FieldGetValue.wire_tag());
            w.u32(node);
            w.u32(field);
            w.bool(proto_internal);
            if request.index >= 0 {
                #[allow(clippy::cast_sign_loss)]
                w.u32(request.index as u32);
            }
        }
        RequestKind::Set => {
            w.u8(RequestOpcode::FieldSetValue.wire_tag());
            w.u32(node);
            w.u32(field);
            w.u32(kind.wire_tag());
            #[allow(clippy::cast_sign_loss)]
            w.u32(request.index.max(0) as u32);
            if let Some(value) = &request.data {
                encode_payload(w, value);
            }
        }
        RequestKind::Import | RequestKind::ImportFromString => {
            let opcode = if request.kind == RequestKind::Import {
                RequestOpcode::FieldInsertValue
            } else {
                RequestOpcode::FieldImportNodeFromString
            };
            w.u8(opcode.wire_tag());
            w.u32(node);
            w.u32(field);
            #[allow(clippy::cast_sign_loss)]
            w.u32(request.index.max(0) as u32);
            if let Some(value) = &request.data {
                encode_payload(w, value);
            }
        }
        RequestKind::Remove => {
            w.u8(RequestOpcode::FieldRemoveValue.wire_tag());
            w.u32(node);
            w.u32(field);
            #[allow(clippy::cast_sign_loss)]
            w.u32(request.index.max(0) as u32);
        }
    }
}

fn encode_payload(w: &mut ByteWriter, value: &supervisor_types::FieldValue) {
    match value {
        supervisor_types::FieldValue::Sf(v) => crate::value_codec::encode_scalar(w, v),
        supervisor_types::FieldValue::Mf(values) => {
            for v in values {
                crate::value_codec::encode_scalar(w, v);
            }
        }
    }
}

fn encode_label(w: &mut ByteWriter, label: &Label) {
    w.u8(RequestOpcode::SetLabel.wire_tag());
    w.u16(label.id);
    w.f64(label.x);
    w.f64(label.y);
    w.f64(label.size);
    w.u32(label.color_with_alpha);
    w.string(&label.text);
    w.string(&label.font);
}

fn encode_one_shot(w: &mut ByteWriter, one_shot: &OneShot) {
    match one_shot {
        OneShot::GetPosition(id) => {
            w.u8(RequestOpcode::NodeGetPosition.wire_tag());
            w.u32(*id);
        }
        OneShot::GetOrientation(id) => {
            w.u8(RequestOpcode::NodeGetOrientation.wire_tag());
            w.u32(*id);
        }
        OneShot::GetCenterOfMass(id) => {
            w.u8(RequestOpcode::NodeGetCenterOfMass.wire_tag());
            w.u32(*id);
        }
        OneShot::GetContactPoints {
            node,
            include_descendants,
        } => {
            w.u8(RequestOpcode::NodeGetContactPoints.wire_tag());
            w.u32(*node);
            w.bool(*include_descendants);
        }
        OneShot::GetStaticBalance(id) => {
            w.u8(RequestOpcode::NodeGetStaticBalance.wire_tag());
            w.u32(*id);
        }
        OneShot::GetVelocity(id) => {
            w.u8(RequestOpcode::NodeGetVelocity.wire_tag());
            w.u32(*id);
        }
        OneShot::SetVelocity { node, velocity } => {
            w.u8(RequestOpcode::NodeSetVelocity.wire_tag());
            w.u32(*node);
            for component in velocity {
                w.f64(*component);
            }
        }
        OneShot::ResetPhysics => w.u8(RequestOpcode::SimulationResetPhysics.wire_tag()),
        OneShot::RestartController => w.u8(RequestOpcode::RestartController.wire_tag()),
        OneShot::SetVisibility {
            node,
            viewer,
            visible,
        } => {
            w.u8(RequestOpcode::NodeSetVisibility.wire_tag());
            w.u32(*node);
            w.u32(*viewer);
            w.bool(*visible);
        }
        OneShot::MoveViewpoint(id) => {
            w.u8(RequestOpcode::MoveViewpoint.wire_tag());
            w.u32(*id);
        }
        OneShot::AddForce {
            node,
            force,
            relative,
        } => {
            w.u8(RequestOpcode::NodeAddForce.wire_tag());
            w.u32(*node);
            for component in force {
                w.f64(*component);
            }
            w.bool(*relative);
        }
        OneShot::AddForceWithOffset {
            node,
            force,
            offset,
            relative,
        } => {
            w.u8(RequestOpcode::NodeAddForceWithOffset.wire_tag());
            w.u32(*node);
            for component in force {
                w.f64(*component);
            }
            for component in offset {
                w.f64(*component);
            }
            w.bool(*relative);
        }
        OneShot::AddTorque {
            node,
            torque,
            relative,
        } => {
            w.u8(RequestOpcode::NodeAddTorque.wire_tag());
            w.u32(*node);
            for component in torque {
                w.f64(*component);
            }
            w.bool(*relative);
        }
    }
}

fn encode_session_action(w: &mut ByteWriter, action: &SessionAction) {
    match action {
        SessionAction::ExportImage { filename, quality } => {
            w.u8(RequestOpcode::ExportImage.wire_tag());
            w.u8(*quality);
            w.string(filename);
        }
        SessionAction::StartMovie {
            filename,
            width,
            height,
            codec,
            quality,
            accelerated,
            caption,
        } => {
            w.u8(RequestOpcode::StartMovie.wire_tag());
            w.i32(*width);
            w.i32(*height);
            w.u8(*codec);
            w.u8(*quality);
            w.bool(*accelerated);
            w.bool(*caption);
            w.string(filename);
        }
        SessionAction::StopMovie => w.u8(RequestOpcode::StopMovie.wire_tag()),
        SessionAction::StartAnimation(filename) => {
            w.u8(RequestOpcode::StartAnimation.wire_tag());
            w.string(filename);
        }
        SessionAction::StopAnimation => w.u8(RequestOpcode::StopAnimation.wire_tag()),
        SessionAction::SaveWorld(filename) => {
            w.u8(RequestOpcode::SaveWorld.wire_tag());
            w.bool(filename.is_some());
            if let Some(name) = filename {
                w.string(name);
            }
        }
        SessionAction::VrHeadsetQuery => w.u8(RequestOpcode::VrHeadsetQuery.wire_tag()),
    }
}

/// Serialize one outbound item's opcode and payload onto `w`.
pub fn encode_item(w: &mut ByteWriter, item: &OutboundItem<'_>) {
    match item {
        OutboundItem::Scene(action) => encode_scene_action(w, action),
        OutboundItem::Resolution(req) => encode_resolution(w, req),
        OutboundItem::Field {
            node,
            field,
            kind,
            proto_internal,
            request,
        } => encode_field_request(w, *node, *field, *kind, *proto_internal, request),
        OutboundItem::Label(label) => encode_label(w, label),
        OutboundItem::RemoveNode(id) => {
            w.u8(RequestOpcode::NodeRemoveNode.wire_tag());
            w.u32(*id);
        }
        OutboundItem::OneShot(one_shot) => encode_one_shot(w, one_shot),
        OutboundItem::Session(action) => encode_session_action(w, action),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use supervisor_types::{FieldValue, ScalarValue};

    #[test]
    fn encodes_scene_action_quit() {
        let mut w = ByteWriter::new();
        encode_item(&mut w, &OutboundItem::Scene(&SceneAction::Quit(1)));
        let bytes = w.into_bytes();
        assert_eq!(bytes[0], RequestOpcode::Quit.wire_tag());
        assert_eq!(bytes.len(), 5);
    }

    #[test]
    fn encodes_field_set_with_payload() {
        let request = FieldRequest {
            kind: RequestKind::Set,
            field: supervisor_types::FieldHandle::from_raw_parts(0, 0),
            index: -1,
            data: Some(FieldValue::Sf(ScalarValue::Bool(true))),
        };
        let mut w = ByteWriter::new();
        encode_item(
            &mut w,
            &OutboundItem::Field {
                node: 3,
                field: 4,
                kind: ScalarKind::Bool,
                proto_internal: false,
                request: &request,
            },
        );
        let bytes = w.into_bytes();
        assert_eq!(bytes[0], RequestOpcode::FieldSetValue.wire_tag());
    }

    #[test]
    fn encodes_label() {
        let label = Label {
            id: 1,
            text: String::from("hi"),
            font: String::from("Arial"),
            x: 0.1,
            y: 0.2,
            size: 0.05,
            color_with_alpha: 0xFFFF_FFFF,
        };
        let mut w = ByteWriter::new();
        encode_item(&mut w, &OutboundItem::Label(&label));
        let bytes = w.into_bytes();
        assert_eq!(bytes[0], RequestOpcode::SetLabel.wire_tag());
    }
}
