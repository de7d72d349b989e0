// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed scene-graph field values (spec §4.2, component C3).
//!
//! Nine scalar kinds, each with an SF (single) and MF (multi) form that
//! share the same per-element payload shape. This module is pure data —
//! validation lives in [`crate::validate`], wire encoding in
//! `supervisor-wire`.

use alloc::string::String;
use alloc::vec::Vec;

use crate::ids::NodeId;

/// The nine scalar field kinds a scene-graph field may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScalarKind {
    /// `SFBool` / `MFBool`.
    Bool = 0,
    /// `SFInt32` / `MFInt32`.
    Int32 = 1,
    /// `SFFloat` / `MFFloat` (wire `float64`).
    Float = 2,
    /// `SFVec2f` / `MFVec2f`.
    Vec2f = 3,
    /// `SFVec3f` / `MFVec3f`.
    Vec3f = 4,
    /// `SFRotation` / `MFRotation` (axis + angle, 4 components).
    Rotation = 5,
    /// `SFColor` / `MFColor` (RGB, components in `[0, 1]`).
    Color = 6,
    /// `SFString` / `MFString`.
    String = 7,
    /// `SFNode` / `MFNode`, carried by uid (`0` means null).
    Node = 8,
}

impl ScalarKind {
    /// All nine kinds, in wire-tag order.
    pub const ALL: [ScalarKind; 9] = [
        ScalarKind::Bool,
        ScalarKind::Int32,
        ScalarKind::Float,
        ScalarKind::Vec2f,
        ScalarKind::Vec3f,
        ScalarKind::Rotation,
        ScalarKind::Color,
        ScalarKind::String,
        ScalarKind::Node,
    ];

    /// Decode a kind from its wire tag. `None` if the tag is unrecognized.
    #[must_use]
    pub const fn from_wire_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Bool),
            1 => Some(Self::Int32),
            2 => Some(Self::Float),
            3 => Some(Self::Vec2f),
            4 => Some(Self::Vec3f),
            5 => Some(Self::Rotation),
            6 => Some(Self::Color),
            7 => Some(Self::String),
            8 => Some(Self::Node),
            _ => None,
        }
    }

    /// This kind's wire tag.
    #[must_use]
    pub const fn wire_tag(self) -> u32 {
        self as u32
    }
}

/// A single field element: one SF value, or one element of an MF array.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// Double-precision float.
    Float(f64),
    /// 2-component vector.
    Vec2f([f64; 2]),
    /// 3-component vector.
    Vec3f([f64; 3]),
    /// Axis + angle rotation: `[x, y, z, angle]`.
    Rotation([f64; 4]),
    /// RGB color, each component in `[0, 1]`.
    Color([f64; 3]),
    /// Owned string payload.
    String(String),
    /// Node reference by uid (`0` is null).
    Node(NodeId),
}

impl ScalarValue {
    /// This value's kind.
    #[must_use]
    pub const fn kind(&self) -> ScalarKind {
        match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::Int32(_) => ScalarKind::Int32,
            Self::Float(_) => ScalarKind::Float,
            Self::Vec2f(_) => ScalarKind::Vec2f,
            Self::Vec3f(_) => ScalarKind::Vec3f,
            Self::Rotation(_) => ScalarKind::Rotation,
            Self::Color(_) => ScalarKind::Color,
            Self::String(_) => ScalarKind::String,
            Self::Node(_) => ScalarKind::Node,
        }
    }

    /// View as a bool, if this is that kind.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// View as an int32, if this is that kind.
    #[must_use]
    pub const fn as_int32(&self) -> Option<i32> {
        match self {
            Self::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// View as a float, if this is that kind.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// View as a vec2f, if this is that kind.
    #[must_use]
    pub const fn as_vec2f(&self) -> Option<[f64; 2]> {
        match self {
            Self::Vec2f(v) => Some(*v),
            _ => None,
        }
    }

    /// View as a vec3f, if this is that kind.
    #[must_use]
    pub const fn as_vec3f(&self) -> Option<[f64; 3]> {
        match self {
            Self::Vec3f(v) => Some(*v),
            _ => None,
        }
    }

    /// View as a rotation, if this is that kind.
    #[must_use]
    pub const fn as_rotation(&self) -> Option<[f64; 4]> {
        match self {
            Self::Rotation(v) => Some(*v),
            _ => None,
        }
    }

    /// View as a color, if this is that kind.
    #[must_use]
    pub const fn as_color(&self) -> Option<[f64; 3]> {
        match self {
            Self::Color(v) => Some(*v),
            _ => None,
        }
    }

    /// View as a string, if this is that kind.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// View as a node reference, if this is that kind.
    #[must_use]
    pub const fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(v) => Some(*v),
            _ => None,
        }
    }
}

/// A field's full value: single-valued or multi-valued.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Single-valued field contents.
    Sf(ScalarValue),
    /// Multi-valued field contents, in element order.
    Mf(Vec<ScalarValue>),
}

impl FieldValue {
    /// Borrow the SF payload, if this is single-valued.
    #[must_use]
    pub const fn as_sf(&self) -> Option<&ScalarValue> {
        match self {
            Self::Sf(v) => Some(v),
            Self::Mf(_) => None,
        }
    }

    /// Borrow the MF payload, if this is multi-valued.
    #[must_use]
    pub fn as_mf(&self) -> Option<&[ScalarValue]> {
        match self {
            Self::Mf(v) => Some(v.as_slice()),
            Self::Sf(_) => None,
        }
    }

    /// Number of elements: `1` for SF, `len()` for MF.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Sf(_) => 1,
            Self::Mf(v) => v.len(),
        }
    }

    /// Whether this holds zero elements (only possible for an empty MF array).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Mf(v) if v.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_tag_roundtrip() {
        for kind in ScalarKind::ALL {
            assert_eq!(ScalarKind::from_wire_tag(kind.wire_tag()), Some(kind));
        }
    }

    #[test]
    fn unknown_wire_tag_is_none() {
        assert_eq!(ScalarKind::from_wire_tag(99), None);
    }

    #[test]
    fn field_value_len() {
        assert_eq!(FieldValue::Sf(ScalarValue::Bool(true)).len(), 1);
        assert_eq!(
            FieldValue::Mf(Vec::from([
                ScalarValue::Int32(1),
                ScalarValue::Int32(2),
                ScalarValue::Int32(3),
            ]))
            .len(),
            3
        );
        assert!(FieldValue::Mf(Vec::new()).is_empty());
    }

    #[test]
    fn scalar_accessors_reject_wrong_kind() {
        let v = ScalarValue::Vec3f([1.0, 2.0, 3.0]);
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.as_vec3f(), Some([1.0, 2.0, 3.0]));
    }
}
