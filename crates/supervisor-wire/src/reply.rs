// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Inbound reply decoding and dispatch (spec §4.5 frame reader).

use alloc::vec::Vec;

use supervisor_types::{MovieStatus, ScalarKind};

use crate::cursor::ByteReader;
use crate::error::WireError;
use crate::opcode::ReplyOpcode;

/// One decoded inbound message, ready for the client's frame reader to
/// apply to the registry/session state (spec §4.5 per-opcode actions).
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// `CONFIGURE`: the controller's own robot node id and its
    /// PROTO-internal flag.
    Configure {
        /// The controller's own robot node id.
        self_node_id: u32,
        /// Whether the self node is itself PROTO-internal.
        is_proto_internal: bool,
    },
    /// A node resolution succeeded or failed (`uid == 0` means not found).
    NodeResolved {
        /// Resolved node id, or `0` if not found.
        uid: u32,
        /// Node type tag.
        type_tag: i32,
        /// Parent node id.
        parent_id: i32,
    },
    /// `FIELD_GET_FROM_NAME`: `field_ref == -1` means "not found".
    FieldResolved {
        /// Server-assigned field id, or `-1` if not found.
        field_ref: i32,
        /// `(kind, is_mf)`, absent when `field_ref == -1`.
        kind: Option<(ScalarKind, bool)>,
        /// Element count for MF fields; `-1` for SF or not-found.
        mf_count: i32,
    },
    /// `FIELD_GET_VALUE`: decoded value for the field that was in flight.
    FieldValue {
        /// Owning node id.
        node: u32,
        /// Server-assigned field id.
        field: u32,
        /// Scalar kind the payload was decoded as.
        kind: ScalarKind,
        /// Whether the field is multi-valued.
        is_mf: bool,
        /// Decoded elements: exactly one for SF, `mf_count` for MF.
        elements: Vec<supervisor_types::ScalarValue>,
    },
    /// `NODE_REGENERATED`: purge every PROTO-internal handle.
    NodeRegenerated,
    /// `FIELD_INSERT_VALUE`: number of nodes actually inserted.
    FieldInserted {
        /// Owning node id.
        node: u32,
        /// Server-assigned field id.
        field: u32,
        /// Number of nodes the server actually inserted.
        inserted_count: i32,
    },
    /// `NODE_REMOVE_NODE`: the node was removed; `parent_field_count` is
    /// the parent field's new element count.
    NodeRemoved {
        /// The removed node's id.
        node: u32,
        /// The parent field's new element count.
        parent_field_count: i32,
    },
    /// A physics vector query result (`None` is the absent-data sentinel).
    Vector3 {
        /// Target node id.
        node: u32,
        /// Which one-shot query this answers.
        which: VectorKind3,
        /// The vector, or `None` if the node doesn't carry this attribute.
        value: Option<[f64; 3]>,
    },
    /// Orientation matrix query result.
    Orientation {
        /// Target node id.
        node: u32,
        /// Row-major 3x3 orientation matrix, or `None` if absent.
        value: Option<[f64; 9]>,
    },
    /// Velocity query result.
    Velocity {
        /// Target node id.
        node: u32,
        /// `[vx, vy, vz, wx, wy, wz]`, or `None` if absent.
        value: Option<[f64; 6]>,
    },
    /// Contact-point query result.
    ContactPoints {
        /// Target node id.
        node: u32,
        /// Contact point coordinates, 3 components per point.
        points: Vec<f64>,
        /// Node id owning each contact point, paired by index.
        point_node_ids: Vec<u32>,
        /// Simulation time the points were captured at.
        time_stamp: f64,
    },
    /// Static-balance query result.
    StaticBalance {
        /// Target node id.
        node: u32,
        /// Whether the node is statically balanced.
        value: bool,
    },
    /// Movie capture status update.
    MovieStatusUpdate(MovieStatus),
    /// Animation capture status update.
    AnimationStatusUpdate(MovieStatus),
    /// World-save completion status.
    SaveStatusUpdate {
        /// Whether the save completed successfully.
        succeeded: bool,
    },
    /// VR-headset pose/state reply.
    VrHeadsetReply {
        /// Opaque server-defined payload.
        payload: Vec<u8>,
    },
    /// An opcode this port doesn't recognize; hand off to the base
    /// robot reader (spec §4.5 "protocol extension point").
    Unrecognized {
        /// The unrecognized opcode byte.
        opcode: u8,
        /// The remainder of the message, unparsed.
        payload: Vec<u8>,
    },
}

/// Which one-shot vector query a [`ServerEvent::Vector3`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind3 {
    /// Global position.
    Position,
    /// Center of mass.
    CenterOfMass,
}

fn decode_movie_status(tag: u8) -> MovieStatus {
    match tag {
        0 => MovieStatus::Ready,
        1 => MovieStatus::Recording,
        2 => MovieStatus::Saving,
        3 => MovieStatus::SimulationError,
        4 => MovieStatus::FileError,
        _ => MovieStatus::EncodingError,
    }
}

fn decode_absent_vector<const N: usize>(r: &mut ByteReader<'_>) -> Result<Option<[f64; N]>, WireError> {
    let present = r.bool()?;
    if !present {
        return Ok(None);
    }
    let mut out = [0.0; N];
    for slot in &mut out {
        *slot = r.f64()?;
    }
    Ok(Some(out))
}

/// Decode one server message: a one-byte opcode followed by its payload.
///
/// # Errors
///
/// Returns [`WireError::BufferUnderrun`] if the payload is truncated, or
/// [`WireError::UnknownScalarKind`] if a `FIELD_GET_VALUE` reply names an
/// unrecognized scalar kind tag. An unrecognized *opcode* is not an
/// error — it decodes to [`ServerEvent::Unrecognized`] so the caller can
/// hand it to the base robot reader.
pub fn decode_event(r: &mut ByteReader<'_>) -> Result<ServerEvent, WireError> {
    let opcode_byte = r.u8()?;
    let Ok(opcode) = ReplyOpcode::from_wire_tag(opcode_byte) else {
        let rest = r.raw(r.remaining())?;
        return Ok(ServerEvent::Unrecognized {
            opcode: opcode_byte,
            payload: rest.to_vec(),
        });
    };

    Ok(match opcode {
        ReplyOpcode::Configure => ServerEvent::Configure {
            self_node_id: r.u32()?,
            is_proto_internal: r.bool()?,
        },
        ReplyOpcode::NodeGetFromId
        | ReplyOpcode::NodeGetFromDef
        | ReplyOpcode::NodeGetFromTag
        | ReplyOpcode::NodeGetSelected => ServerEvent::NodeResolved {
            uid: r.u32()?,
            type_tag: r.i32()?,
            parent_id: r.i32()?,
        },
        ReplyOpcode::FieldGetFromName => {
            let field_ref = r.i32()?;
            if field_ref < 0 {
                ServerEvent::FieldResolved {
                    field_ref,
                    kind: None,
                    mf_count: -1,
                }
            } else {
                let kind_tag = r.u32()?;
                let is_mf = r.bool()?;
                let mf_count = r.i32()?;
                let kind = ScalarKind::from_wire_tag(kind_tag)
                    .ok_or(WireError::UnknownScalarKind(kind_tag))?;
                ServerEvent::FieldResolved {
                    field_ref,
                    kind: Some((kind, is_mf)),
                    mf_count,
                }
            }
        }
        ReplyOpcode::FieldGetValue => {
            let node = r.u32()?;
            let field = r.u32()?;
            let kind_tag = r.u32()?;
            let is_mf = r.bool()?;
            let kind =
                ScalarKind::from_wire_tag(kind_tag).ok_or(WireError::UnknownScalarKind(kind_tag))?;
            let count = if is_mf { r.u32()? } else { 1 };
            let mut elements = Vec::with_capacity(count as usize);
            for _ in 0..count {
                elements.push(crate::value_codec::decode_scalar(r, kind)?);
            }
            ServerEvent::FieldValue {
                node,
                field,
                kind,
                is_mf,
                elements,
            }
        }
        ReplyOpcode::NodeRegenerated => ServerEvent::NodeRegenerated,
        ReplyOpcode::FieldInsertValue => ServerEvent::FieldInserted {
            node: r.u32()?,
            field: r.u32()?,
            inserted_count: r.i32()?,
        },
        ReplyOpcode::NodeRemoveNode => ServerEvent::NodeRemoved {
            node: r.u32()?,
            parent_field_count: r.i32()?,
        },
        ReplyOpcode::NodeGetPosition => ServerEvent::Vector3 {
            node: r.u32()?,
            which: VectorKind3::Position,
            value: decode_absent_vector(r)?,
        },
        ReplyOpcode::NodeGetCenterOfMass => ServerEvent::Vector3 {
            node: r.u32()?,
            which: VectorKind3::CenterOfMass,
            value: decode_absent_vector(r)?,
        },
        ReplyOpcode::NodeGetOrientation => ServerEvent::Orientation {
            node: r.u32()?,
            value: decode_absent_vector(r)?,
        },
        ReplyOpcode::NodeGetVelocity => ServerEvent::Velocity {
            node: r.u32()?,
            value: decode_absent_vector(r)?,
        },
        ReplyOpcode::NodeGetContactPoints => {
            let node = r.u32()?;
            let count = r.u32()?;
            let mut points = Vec::with_capacity(count as usize * 3);
            for _ in 0..count * 3 {
                points.push(r.f64()?);
            }
            let mut point_node_ids = Vec::with_capacity(count as usize);
            for _ in 0..count {
                point_node_ids.push(r.u32()?);
            }
            let time_stamp = r.f64()?;
            ServerEvent::ContactPoints {
                node,
                points,
                point_node_ids,
                time_stamp,
            }
        }
        ReplyOpcode::NodeGetStaticBalance => ServerEvent::StaticBalance {
            node: r.u32()?,
            value: r.bool()?,
        },
        ReplyOpcode::MovieStatus => ServerEvent::MovieStatusUpdate(decode_movie_status(r.u8()?)),
        ReplyOpcode::AnimationStatus => {
            ServerEvent::AnimationStatusUpdate(decode_movie_status(r.u8()?))
        }
        ReplyOpcode::SaveStatus => ServerEvent::SaveStatusUpdate {
            succeeded: r.bool()?,
        },
        ReplyOpcode::VrHeadsetReply => {
            let len = r.u32()?;
            #[allow(clippy::cast_possible_truncation)]
            let payload = r.raw(len as usize)?.to_vec();
            ServerEvent::VrHeadsetReply { payload }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cursor::ByteWriter;

    #[test]
    fn decodes_configure() {
        let mut w = ByteWriter::new();
        w.u8(ReplyOpcode::Configure.wire_tag());
        w.u32(5);
        w.bool(false);
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(
            decode_event(&mut r).unwrap(),
            ServerEvent::Configure {
                self_node_id: 5,
                is_proto_internal: false
            }
        );
    }

    #[test]
    fn decodes_field_get_value_mf() {
        let mut w = ByteWriter::new();
        w.u8(ReplyOpcode::FieldGetValue.wire_tag());
        w.u32(1);
        w.u32(2);
        w.u32(ScalarKind::Int32.wire_tag());
        w.bool(true);
        w.u32(2);
        w.i32(10);
        w.i32(20);
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        let event = decode_event(&mut r).unwrap();
        match event {
            ServerEvent::FieldValue { elements, .. } => assert_eq!(elements.len(), 2),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_opcode_yields_unrecognized_event() {
        let bytes = [0x01u8, 0xAA, 0xBB];
        let mut r = ByteReader::new(&bytes);
        let event = decode_event(&mut r).unwrap();
        assert_eq!(
            event,
            ServerEvent::Unrecognized {
                opcode: 0x01,
                payload: alloc::vec![0xAA, 0xBB]
            }
        );
    }

    #[test]
    fn absent_vector_decodes_to_none() {
        let mut w = ByteWriter::new();
        w.u8(ReplyOpcode::NodeGetPosition.wire_tag());
        w.u32(9);
        w.bool(false);
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(
            decode_event(&mut r).unwrap(),
            ServerEvent::Vector3 {
                node: 9,
                which: VectorKind3::Position,
                value: None
            }
        );
    }
}
