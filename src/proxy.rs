use crate::config::ResolvedConfig;
use crate::error::{BridgeError, Result};
use crate::logging::{JournalLevel, SharedJournal};
use crate::translate::request::to_upstream;
use crate::translate::response::{to_completion, upstream_error_message};
use crate::translate::types::{ChatCompletion, ChatRequest, UpstreamResponse};

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

/// Raw upstream event-stream bytes, relayed untouched.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send>>;

/// Build the shared upstream client. No timeout unless one is configured.
pub fn build_client(config: &ResolvedConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// POST the translated request upstream and return the raw response if the
/// status is a success. Failure statuses become [`BridgeError::Upstream`].
async fn send(
    req: &ChatRequest,
    config: &ResolvedConfig,
    client: &reqwest::Client,
    journal: &SharedJournal,
) -> Result<reqwest::Response> {
    let url = config.completions_url();
    let upstream_req = to_upstream(req, &config.upstream_model, &config.defaults);

    tracing::info!(
        url = %url,
        requested = %req.model,
        upstream = %upstream_req.model,
        stream = upstream_req.stream,
        "forwarding chat completion"
    );
    journal.info(
        "proxy",
        format!(
            "POST {} model={} requested={} stream={}",
            url, upstream_req.model, req.model, upstream_req.stream
        ),
    );

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", config.upstream_key))
        .header("Content-Type", "application/json")
        .json(&upstream_req)
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(status = status.as_u16(), error = %e, "failed to read upstream error body");
            journal.debug("proxy", format!("Failed to read upstream error body: {e}"));
            String::new()
        }
    };
    let message = upstream_error_message(&body).unwrap_or_else(|| {
        if body.is_empty() {
            format!("Upstream returned status {}", status.as_u16())
        } else {
            format!("Upstream returned status {}: {}", status.as_u16(), truncate(&body, 300))
        }
    });

    tracing::warn!(status = status.as_u16(), message = %message, "upstream error");
    journal.record_with_context(
        JournalLevel::Warn,
        "proxy",
        format!("Upstream error: {message}"),
        serde_json::json!({"status": status.as_u16(), "url": url}),
    );

    Err(BridgeError::upstream(status.as_u16(), message))
}

/// Forward a non-streaming request and translate the completion.
pub async fn proxy_completion(
    req: &ChatRequest,
    config: &ResolvedConfig,
    client: &reqwest::Client,
    journal: &SharedJournal,
) -> Result<ChatCompletion> {
    let response = send(req, config, client, journal).await?;
    let body = response.bytes().await?;

    let upstream: UpstreamResponse = serde_json::from_slice(&body).map_err(|e| {
        BridgeError::translation(format!(
            "Failed to parse upstream response: {}. Body: {}",
            e,
            truncate(&String::from_utf8_lossy(&body), 300)
        ))
    })?;

    let completion = to_completion(&upstream, &req.model);

    journal.info(
        "proxy",
        format!(
            "Completed: choices={} prompt={} completion={} tokens",
            completion.choices.len(),
            completion.usage.prompt_tokens,
            completion.usage.completion_tokens
        ),
    );

    Ok(completion)
}

/// Forward a streaming request and hand back the upstream body as-is.
pub async fn proxy_stream(
    req: &ChatRequest,
    config: &ResolvedConfig,
    client: &reqwest::Client,
    journal: &SharedJournal,
) -> Result<ByteStream> {
    let response = send(req, config, client, journal).await?;
    Ok(Box::pin(relay(response.bytes_stream(), journal.clone())))
}

/// Pass upstream chunks through, recording how the stream ended.
fn relay(
    byte_stream: impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
    journal: SharedJournal,
) -> impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static {
    async_stream::stream! {
        let mut relayed: usize = 0;

        tokio::pin!(byte_stream);

        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    relayed += bytes.len();
                    yield Ok(bytes);
                }
                Err(e) => {
                    tracing::error!(error = %e, relayed, "upstream stream failed");
                    journal.error("stream", format!("Upstream stream error after {relayed} bytes: {e}"));
                    yield Err(e);
                    return;
                }
            }
        }

        tracing::debug!(relayed, "stream completed");
        journal.info("stream", format!("Stream completed, {relayed} bytes relayed"));
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("héllo", 2), "h");
    }

    #[tokio::test]
    async fn test_relay_passes_bytes_through() {
        let chunks: Vec<std::result::Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"a\":1}\n\n")),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
        ];
        let journal = SharedJournal::in_memory();

        let out: Vec<Bytes> = relay(futures::stream::iter(chunks), journal.clone())
            .filter_map(|c| async move { c.ok() })
            .collect()
            .await;

        assert_eq!(out.concat(), b"data: {\"a\":1}\n\ndata: [DONE]\n\n".to_vec());
        assert!(journal.recent(1)[0].message.contains("bytes relayed"));
    }
}
