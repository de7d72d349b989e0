// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! API-layer errors (spec §7): every variant is non-fatal. The public
//! API never surfaces these as panics or process aborts — callers that
//! want the raw cause can match on [`ApiError`]; callers that just
//! want the spec's sentinel-return behavior use the `Supervisor*`
//! typed accessors, which log via `tracing` and return a sentinel.

use supervisor_types::ValidationError;

/// Failure category for one supervisor API call (spec §7 taxonomy).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Category 1: called from a controller that isn't the designated supervisor.
    #[error("operation requires the supervisor role")]
    NotSupervisor,

    /// Category 2: argument validation failed before a request was built.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Category 3: a handle the caller passed is not present in the registry.
    ///
    /// Diagnostics for this variant are suppressed while the process is
    /// quitting (spec §7 category 3).
    #[error("handle is stale or was never valid")]
    StaleHandle,

    /// A second `GET` was attempted while one was already in flight; the
    /// API layer prevents this by construction rather than sending it.
    #[error("a GET is already in flight; at most one may be outstanding")]
    GetAlreadyInFlight,

    /// The underlying transport failed to deliver or receive a frame.
    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_converts_via_from() {
        let err: ApiError = ValidationError::EmptyString.into();
        assert_eq!(err, ApiError::Validation(ValidationError::EmptyString));
    }
}
