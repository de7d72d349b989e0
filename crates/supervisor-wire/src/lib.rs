// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Binary wire codec for the supervisor protocol.
//!
//! Frames are little-endian, opcode-tagged byte sequences (spec §6):
//! integers are 16/32-bit LE, doubles are IEEE-754 binary64, strings
//! are `u32`-length-prefixed and NUL-terminated. This crate is pure
//! encode/decode — it has no opinion on request queuing, coalescing,
//! or transport; that lives in `supervisor-client`.
//!
//! # Layout
//!
//! - [`cursor`]: little-endian [`cursor::ByteReader`]/[`cursor::ByteWriter`] primitives.
//! - [`opcode`]: the `C_SUPERVISOR_*` opcode tables, split by direction.
//! - [`value_codec`]: per-[`supervisor_types::ScalarKind`] encode/decode.
//! - [`request`]: outbound frame items and their wire shapes.
//! - [`reply`]: inbound message decoding and dispatch.

#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod cursor;
pub mod error;
pub mod opcode;
pub mod reply;
pub mod request;
pub mod value_codec;

pub use cursor::{ByteReader, ByteWriter};
pub use error::WireError;
pub use opcode::{ReplyOpcode, RequestOpcode};
pub use reply::{decode_event, ServerEvent, VectorKind3};
pub use request::{encode_item, OneShot, OutboundItem, ResolutionRequest, SessionAction};
pub use value_codec::{decode_scalar, encode_scalar};
