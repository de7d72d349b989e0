// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-kind scalar encode/decode (spec §6 "Per-kind SET/INSERT payload").
//!
//! One encode/decode function pair per [`ScalarKind`], mirroring the
//! codec crate's per-type function style rather than a single generic
//! dispatch — each kind's wire shape is easier to audit in isolation.

use alloc::string::String;

use supervisor_types::{ScalarKind, ScalarValue};

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::WireError;

// ============================================================================
// Bool
// ============================================================================

fn encode_bool(w: &mut ByteWriter, v: bool) {
    w.bool(v);
}

fn decode_bool(r: &mut ByteReader<'_>) -> Result<bool, WireError> {
    r.bool()
}

// ============================================================================
// Int32
// ============================================================================

fn encode_int32(w: &mut ByteWriter, v: i32) {
    w.i32(v);
}

fn decode_int32(r: &mut ByteReader<'_>) -> Result<i32, WireError> {
    r.i32()
}

// ============================================================================
// Float
// ============================================================================

fn encode_float(w: &mut ByteWriter, v: f64) {
    w.f64(v);
}

fn decode_float(r: &mut ByteReader<'_>) -> Result<f64, WireError> {
    r.f64()
}

// ============================================================================
// Vec2f / Vec3f / Rotation / Color
// ============================================================================

fn encode_f64_array(w: &mut ByteWriter, arr: &[f64]) {
    for component in arr {
        w.f64(*component);
    }
}

fn decode_f64_array<const N: usize>(r: &mut ByteReader<'_>) -> Result<[f64; N], WireError> {
    let mut out = [0.0; N];
    for slot in &mut out {
        *slot = r.f64()?;
    }
    Ok(out)
}

// ============================================================================
// String
// ============================================================================

fn encode_string(w: &mut ByteWriter, v: &str) {
    w.string(v);
}

fn decode_string(r: &mut ByteReader<'_>) -> Result<String, WireError> {
    r.string()
}

// ============================================================================
// Node
// ============================================================================

fn encode_node(w: &mut ByteWriter, uid: u32) {
    w.u32(uid);
}

fn decode_node(r: &mut ByteReader<'_>) -> Result<u32, WireError> {
    r.u32()
}

// ============================================================================
// Dispatch
// ============================================================================

/// Encode a single scalar element's payload, per its kind's wire shape.
pub fn encode_scalar(w: &mut ByteWriter, value: &ScalarValue) {
    match value {
        ScalarValue::Bool(v) => encode_bool(w, *v),
        ScalarValue::Int32(v) => encode_int32(w, *v),
        ScalarValue::Float(v) => encode_float(w, *v),
        ScalarValue::Vec2f(v) => encode_f64_array(w, v),
        ScalarValue::Vec3f(v) => encode_f64_array(w, v),
        ScalarValue::Rotation(v) => encode_f64_array(w, v),
        ScalarValue::Color(v) => encode_f64_array(w, v),
        ScalarValue::String(v) => encode_string(w, v),
        ScalarValue::Node(v) => encode_node(w, *v),
    }
}

/// Decode a single scalar element given its expected kind.
///
/// # Errors
///
/// Propagates [`WireError::BufferUnderrun`] or [`WireError::InvalidUtf8`]
/// from the underlying cursor reads.
pub fn decode_scalar(r: &mut ByteReader<'_>, kind: ScalarKind) -> Result<ScalarValue, WireError> {
    Ok(match kind {
        ScalarKind::Bool => ScalarValue::Bool(decode_bool(r)?),
        ScalarKind::Int32 => ScalarValue::Int32(decode_int32(r)?),
        ScalarKind::Float => ScalarValue::Float(decode_float(r)?),
        ScalarKind::Vec2f => ScalarValue::Vec2f(decode_f64_array(r)?),
        ScalarKind::Vec3f => ScalarValue::Vec3f(decode_f64_array(r)?),
        ScalarKind::Rotation => ScalarValue::Rotation(decode_f64_array(r)?),
        ScalarKind::Color => ScalarValue::Color(decode_f64_array(r)?),
        ScalarKind::String => ScalarValue::String(decode_string(r)?),
        ScalarKind::Node => ScalarValue::Node(decode_node(r)?),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_every_kind() {
        let samples = [
            ScalarValue::Bool(true),
            ScalarValue::Int32(-42),
            ScalarValue::Float(1.5),
            ScalarValue::Vec2f([1.0, 2.0]),
            ScalarValue::Vec3f([1.0, 2.0, 3.0]),
            ScalarValue::Rotation([0.0, 1.0, 0.0, 1.57]),
            ScalarValue::Color([0.1, 0.2, 0.3]),
            ScalarValue::String(alloc::string::String::from("box.wbo")),
            ScalarValue::Node(7),
        ];
        for sample in samples {
            let mut w = ByteWriter::new();
            encode_scalar(&mut w, &sample);
            let bytes = w.into_bytes();
            let mut r = ByteReader::new(&bytes);
            let decoded = decode_scalar(&mut r, sample.kind()).unwrap();
            assert_eq!(decoded, sample);
            assert_eq!(r.remaining(), 0);
        }
    }
}
