// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire decode/encode errors.

/// A failure while decoding a byte buffer into a typed wire message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The buffer ended before a fixed-size field could be read.
    #[error("buffer underrun: needed {needed} bytes at offset {offset}, had {available}")]
    BufferUnderrun {
        /// Offset the read started at.
        offset: usize,
        /// Bytes required to satisfy the read.
        needed: usize,
        /// Bytes actually remaining in the buffer.
        available: usize,
    },

    /// A length-prefixed string was not valid UTF-8.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    /// An opcode byte did not match any known `C_SUPERVISOR_*` opcode.
    #[error("unknown opcode byte {0:#04x}")]
    UnknownOpcode(u8),

    /// A scalar-kind wire tag did not match any of the nine known kinds.
    #[error("unknown scalar kind tag {0}")]
    UnknownScalarKind(u32),

    /// A string length prefix exceeded the sanity ceiling.
    #[error("string length {0} exceeds maximum {1}")]
    StringTooLong(u32, u32),
}
