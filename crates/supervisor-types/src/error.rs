// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Argument-validation errors (spec §7 category 2).

use alloc::string::String;

/// A validation failure caught before a request is ever queued.
///
/// These correspond to the "argument misuse" error category: every
/// variant is recoverable by construction — the API layer catches it,
/// logs a diagnostic, and returns the caller's sentinel value. Nothing
/// in this crate panics on bad input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A float field value was NaN, infinite, or exceeded `FLT_MAX` in magnitude.
    #[error("float value {0} is not finite or exceeds FLT_MAX magnitude")]
    NonFiniteFloat(f64),

    /// A rotation's `(x, y, z)` axis was all-zero.
    #[error("rotation axis (x, y, z) must not be all-zero")]
    DegenerateRotationAxis,

    /// A color component was outside `[0, 1]`.
    #[error("color component {0} is outside [0, 1]")]
    ColorOutOfGamut(f64),

    /// An MF index fell outside the valid range for the field's element count.
    #[error("MF index {index} out of range for count {count} (valid range [{min}, {max}])")]
    IndexOutOfRange {
        /// The index the caller supplied.
        index: i32,
        /// The field's current element count.
        count: i32,
        /// Minimum valid index (inclusive).
        min: i32,
        /// Maximum valid index (inclusive).
        max: i32,
    },

    /// A required string argument was null or empty.
    #[error("required string argument is empty")]
    EmptyString,

    /// A filename lacked the extension required for this operation.
    #[error("filename {filename:?} must end in one of {expected:?}")]
    BadFilenameExtension {
        /// The filename as given.
        filename: String,
        /// Acceptable extensions for this operation, including the leading dot.
        expected: &'static [&'static str],
    },

    /// A `.wrl` import was attempted somewhere other than the root's
    /// `children` field at the tail position.
    #[error("`.wrl` import is only legal on the root node's children field, at the tail position")]
    WrlImportNotAtRootTail,

    /// The caller asked for a kind-specific accessor on a field of a
    /// different kind.
    #[error("field is of kind {actual:?}, not {expected:?}")]
    WrongFieldKind {
        /// The kind the caller expected.
        expected: crate::ScalarKind,
        /// The field's actual kind.
        actual: crate::ScalarKind,
    },

    /// The caller invoked an SF-only or MF-only operation against a field
    /// of the other arity.
    #[error("field arity mismatch: operation requires {expected_mf_desc}")]
    WrongArity {
        /// Human-readable description of what arity was required.
        expected_mf_desc: &'static str,
    },

    /// The targeted field is read-only because it is PROTO-internal.
    #[error("field is read-only (PROTO-internal)")]
    ProtoInternalReadOnly,
}
