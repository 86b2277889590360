//! Response normalization shared by the adapters.

use std::time::Duration;

use crate::errors::{ModelError, ModelResult};

/// What an adapter does when the primary content field comes back empty.
///
/// Each adapter declares its policy as a constant so the substitution rule is
/// visible per backend:
///
/// | adapter            | secondary field | policy               |
/// |--------------------|-----------------|----------------------|
/// | openai_compatible  | `reasoning`     | `SubstituteSecondary`|
/// | gateway            | `reasoning`     | `SubstituteSecondary`|
/// | ollama             | `thinking`      | `RefuseSecondary`    |
/// | anthropic          | (none)          | `PrimaryOnly`        |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyContentPolicy {
    /// Use the secondary field as the answer when it is non-empty.
    SubstituteSecondary,
    /// Report an empty response, noting that only the secondary trace was produced.
    RefuseSecondary,
    /// No secondary field exists; empty content is an empty response.
    PrimaryOnly,
}

/// Apply `policy` to a (primary, secondary) pair of response fields.
pub fn resolve_content(
    provider: &str,
    primary: Option<&str>,
    secondary: Option<&str>,
    policy: EmptyContentPolicy,
) -> ModelResult {
    let primary = primary.unwrap_or("");
    if !primary.trim().is_empty() {
        return Ok(primary.to_string());
    }

    let secondary = secondary.filter(|s| !s.trim().is_empty());
    match (policy, secondary) {
        (EmptyContentPolicy::SubstituteSecondary, Some(text)) => {
            tracing::warn!(
                provider,
                len = text.len(),
                "model returned empty content, using reasoning field instead"
            );
            Ok(text.to_string())
        }
        (EmptyContentPolicy::RefuseSecondary, Some(text)) => {
            tracing::warn!(
                provider,
                thinking_len = text.len(),
                "model returned only a thinking trace"
            );
            Err(ModelError::EmptyResponse(
                "model produced thinking output but no answer".into(),
            ))
        }
        _ => {
            tracing::warn!(provider, "model returned empty content");
            Err(ModelError::EmptyResponse("no content".into()))
        }
    }
}

/// Map a transport-level error to the failure taxonomy.
pub fn classify_transport(err: &reqwest::Error, timeout: Duration) -> ModelError {
    if err.is_timeout() {
        ModelError::Timeout(timeout.as_secs())
    } else if err.is_decode() {
        ModelError::ParseError(err.to_string())
    } else {
        ModelError::NetworkError(err.to_string())
    }
}

/// Classify a non-success HTTP status; statuses without a dedicated kind fall
/// back to [`classify_message`] on `message`.
pub fn classify_status(status: u16, message: &str) -> ModelError {
    match status {
        401 | 403 => ModelError::AuthError(message.to_string()),
        429 => ModelError::RateLimited(message.to_string()),
        404 => ModelError::ModelNotFound(message.to_string()),
        _ => classify_message(message),
    }
}

/// Best-effort classification of a failure message from a multi-provider backend.
///
/// Matches on wording only. Bare status numbers are not searched for, since
/// they also occur in ports and hosts.
pub fn classify_message(message: &str) -> ModelError {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["authentication", "unauthorized", "invalid api key", "api key"]) {
        ModelError::AuthError(message.to_string())
    } else if has(&["rate limit", "rate_limit", "too many requests"]) {
        ModelError::RateLimited(message.to_string())
    } else if has(&["model not found", "not_found", "does not exist", "unknown model"]) {
        ModelError::ModelNotFound(message.to_string())
    } else {
        ModelError::AdapterError(message.to_string())
    }
}

/// USD estimate at $0.01 / 1K prompt tokens and $0.03 / 1K completion tokens.
pub fn estimate_cost(prompt_tokens: u64, completion_tokens: u64) -> f64 {
    prompt_tokens as f64 / 1000.0 * 0.01 + completion_tokens as f64 / 1000.0 * 0.03
}

/// Copy of a chat request body with image payloads replaced, for debug logs.
pub fn sanitize_for_log(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            if let Some(images) = msg.get_mut("images").and_then(|i| i.as_array_mut()) {
                for img in images {
                    *img = serde_json::Value::String("<omitted_image>".to_string());
                }
            }
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                match part.get("type").and_then(|t| t.as_str()) {
                    Some("image_url") => {
                        if let Some(url) = part.pointer_mut("/image_url/url") {
                            if url.as_str().is_some_and(|u| u.starts_with("data:")) {
                                *url = serde_json::Value::String("<omitted_base64_image>".into());
                            }
                        }
                    }
                    Some("image") => {
                        if let Some(data) = part.pointer_mut("/source/data") {
                            *data = serde_json::Value::String("<omitted_base64_image>".into());
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}
