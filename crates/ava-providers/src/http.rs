// crates/ava-providers/src/http.rs
// ============================================================================
// Module: HTTP Generative Model Client
// Description: Generative-model client implementation over a JSON HTTP API.
// Dependencies: ava-core, reqwest, serde, serde_json
// ============================================================================

//! ## Overview
//! Issues one POST per [`GenerateHintsRequest`](crate::client::GenerateHintsRequest)
//! and parses the response into [`RawHints`]. Response fields outside
//! `0..=100` are clamped rather than rejected, matching the signal
//! adjusters' own clamp-at-every-step posture; a response missing a field,
//! or one that fails to deserialize at all, is a [`ProviderError::InvalidResponse`].

use std::time::Duration;

use async_trait::async_trait;
use ava_core::model::evaluation::clamp_to_u8;
use ava_core::mswim_engine::RawHints;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;

use crate::client::GenerateHintsRequest;
use crate::client::GenerativeModelClient;
use crate::client::ProviderError;

/// Configuration for [`HttpGenerativeClient`].
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Endpoint the client posts hint requests to.
    pub endpoint: String,
    /// Bearer token sent as `Authorization: Bearer <api_key>`.
    pub api_key: String,
    /// Model identifier included in the request body.
    pub model: String,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model: "ava-hints-v1".to_owned(),
            timeout_ms: 3_000,
            user_agent: "ava/0.1".to_owned(),
        }
    }
}

/// Generative-model client backed by a `reqwest` HTTP client.
pub struct HttpGenerativeClient {
    config: HttpProviderConfig,
    client: Client,
}

impl HttpGenerativeClient {
    /// Builds a new client from `config`.
    ///
    /// # Errors
    /// Returns [`ProviderError::Transport`] if the underlying HTTP client
    /// cannot be constructed (malformed user agent, unsupported TLS
    /// backend).
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        Ok(Self { config, client })
    }
}

#[derive(Debug, Serialize)]
struct HintsRequestBody<'a> {
    model: &'a str,
    session_id: &'a str,
    narrative: &'a str,
    detected_friction_ids: Vec<&'a str>,
    page_type: &'static str,
    event_count: usize,
}

#[derive(Debug, Deserialize)]
struct HintsResponseBody {
    intent: i32,
    friction: i32,
    clarity: i32,
    receptivity: i32,
    value: i32,
}

#[async_trait]
impl GenerativeModelClient for HttpGenerativeClient {
    async fn generate_hints(&self, request: &GenerateHintsRequest) -> Result<RawHints, ProviderError> {
        let body = HintsRequestBody {
            model: &self.config.model,
            session_id: request.session_id.as_str(),
            narrative: &request.narrative,
            detected_friction_ids: request.detected_friction_ids.iter().map(|id| id.as_str()).collect(),
            page_type: page_type_label(request.page_type),
            event_count: request.event_count,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Transport(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!("unexpected status {}", response.status())));
        }

        let parsed: HintsResponseBody = response
            .json()
            .await
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))?;

        Ok(RawHints {
            intent: clamp_to_u8(parsed.intent),
            friction: clamp_to_u8(parsed.friction),
            clarity: clamp_to_u8(parsed.clarity),
            receptivity: clamp_to_u8(parsed.receptivity),
            value: clamp_to_u8(parsed.value),
        })
    }
}

fn page_type_label(page_type: ava_core::model::event::PageType) -> &'static str {
    use ava_core::model::event::PageType;
    match page_type {
        PageType::Landing => "landing",
        PageType::Category => "category",
        PageType::SearchResults => "search_results",
        PageType::Pdp => "pdp",
        PageType::Cart => "cart",
        PageType::Checkout => "checkout",
        PageType::Account => "account",
        PageType::Other => "other",
    }
}
