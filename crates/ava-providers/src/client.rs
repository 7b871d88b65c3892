// crates/ava-providers/src/client.rs
// ============================================================================
// Module: Generative Model Client Contract
// Description: The async trait the session evaluator calls in the `llm` and
//              `auto` engine paths, plus the request/error types around it.
// ============================================================================

//! ## Overview
//! The generative model itself is out of scope; this module is the contract
//! an implementation (see [`crate::http`]) must satisfy. A call returns
//! [`ava_core::mswim_engine::RawHints`] directly rather than a parallel
//! struct, since that is exactly what `run_mswim` consumes.

use async_trait::async_trait;
use ava_core::identifiers::FrictionId;
use ava_core::identifiers::SessionId;
use ava_core::model::event::PageType;
use ava_core::mswim_engine::RawHints;
use thiserror::Error;

/// Narrative context passed to the generative model for one flush.
///
/// This mirrors the narrow slice of session state the signal adjusters of
/// `ava-core::signals` read, plus a free-text narrative assembled from the
/// buffered event batch, so the model has enough context to synthesize
/// hints without the evaluator handing over the raw event buffer.
#[derive(Debug, Clone)]
pub struct GenerateHintsRequest {
    /// Session the hints are being generated for.
    pub session_id: SessionId,
    /// Free-text narrative built from the buffered event batch.
    pub narrative: String,
    /// Friction ids detected in the current context window.
    pub detected_friction_ids: Vec<FrictionId>,
    /// Page type at evaluation time.
    pub page_type: PageType,
    /// Number of events in the current context window.
    pub event_count: usize,
}

/// Failure modes a [`GenerativeModelClient`] implementation can surface.
///
/// Every variant is [`ava_core::error::Severity::TransientExternal`]: the
/// evaluator downgrades to the shadow synthesizer on any of these rather
/// than failing the flush.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The call did not complete within its timeout.
    #[error("generative model call timed out")]
    Timeout,

    /// The transport failed (connection, TLS, DNS, non-2xx status).
    #[error("generative model transport error: {0}")]
    Transport(String),

    /// The response body could not be parsed into hints.
    #[error("generative model returned an unparseable response: {0}")]
    InvalidResponse(String),
}

impl From<ProviderError> for ava_core::error::AvaError {
    fn from(value: ProviderError) -> Self {
        Self::TransientExternal(value.to_string())
    }
}

/// A client capable of synthesizing [`RawHints`] from narrative session
/// context via an external generative model.
#[async_trait]
pub trait GenerativeModelClient: Send + Sync {
    /// Requests hints for one flush. Implementations should enforce their
    /// own per-call timeout and return [`ProviderError::Timeout`] on expiry
    /// rather than letting the caller's future hang.
    ///
    /// # Errors
    /// Returns [`ProviderError`] on transport failure, timeout, or an
    /// unparseable response.
    async fn generate_hints(&self, request: &GenerateHintsRequest) -> Result<RawHints, ProviderError>;
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use ava_core::error::AvaError;
    use ava_core::error::Severity;

    use super::ProviderError;

    #[test]
    fn provider_errors_classify_as_transient_external() {
        let err: AvaError = ProviderError::Timeout.into();
        assert_eq!(err.severity(), Severity::TransientExternal);
    }
}
