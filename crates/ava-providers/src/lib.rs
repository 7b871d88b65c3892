// crates/ava-providers/src/lib.rs
// ============================================================================
// Crate: ava-providers
// Description: The generative-model client contract, its HTTP
//              implementation, and the deterministic shadow/fast hint
//              synthesizer.
// ============================================================================

//! ## Overview
//! The generative model itself is out of scope for this workspace; this
//! crate is the contract an implementation satisfies ([`client`]), one
//! concrete HTTP-backed implementation of it ([`http`]), and the
//! deterministic synthesizer used when no generative call is made, whether
//! because the `fast` engine was selected or because shadow comparison
//! needs a baseline ([`shadow`]).

pub mod client;
pub mod http;
pub mod shadow;

pub use client::GenerateHintsRequest;
pub use client::GenerativeModelClient;
pub use client::ProviderError;
pub use http::HttpGenerativeClient;
pub use http::HttpProviderConfig;
pub use shadow::ShadowContext;
pub use shadow::synthesize_hints;
