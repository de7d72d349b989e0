// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stateful supervisor client core.
//!
//! This crate owns everything on the controller side of the
//! supervisor protocol that isn't the wire codec itself: the node and
//! field handle registry, the per-step request queue with
//! read-your-writes coalescing, the one-shot resolution/physics
//! request slots, frame assembly and reply dispatch, and the public
//! [`api::SupervisorApi`] surface a controller actually calls.
//!
//! The binary transport and the driver that decides when a step ends
//! are out of scope; callers plug in their own [`transport::StepDriver`].

mod api;
mod config;
mod error;
mod frame;
mod oneshot;
mod queue;
mod registry;
mod state;
mod transport;

pub use api::SupervisorApi;
pub use config::SupervisorConfig;
pub use error::ApiError;
pub use queue::{Coalesced, RequestQueue};
pub use registry::HandleRegistry;
pub use state::{StepLock, SupervisorState};
pub use transport::{MockTransport, StepDriver};

pub use supervisor_types::{FieldHandle, NodeHandle};
