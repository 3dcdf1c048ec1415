use super::types::{ChatRequest, UpstreamRequest};
use crate::config::DefaultsConfig;

/// Build the upstream request for a client request.
///
/// The client's `model` is not consulted: every request goes to
/// `upstream_model`. Missing sampling parameters take the configured defaults.
pub fn to_upstream(
    req: &ChatRequest,
    upstream_model: &str,
    defaults: &DefaultsConfig,
) -> UpstreamRequest {
    UpstreamRequest {
        model: upstream_model.to_string(),
        messages: req.messages.clone(),
        temperature: req.temperature.unwrap_or(defaults.temperature),
        max_tokens: req.max_tokens.unwrap_or(defaults.max_tokens),
        stream: req.stream.unwrap_or(false),
    }
}
