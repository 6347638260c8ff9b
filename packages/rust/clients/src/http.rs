//! Shared HTTP plumbing for the provider clients.
//!
//! Providers differ in endpoints and payloads but share the same failure
//! taxonomy: transport problems and throttling are transient (the stage
//! runner retries them), rejected credentials kill the collaborator for the
//! whole batch, and everything else is a terminal validation failure for the
//! lead in hand. Clients classify; they never retry internally.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use newsreel_shared::{NewsreelError, StageError};

/// User-Agent string for all outbound provider requests.
pub(crate) const USER_AGENT: &str = concat!("newsreel/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout for provider calls. Kept below the stage runner's
/// deadline so a hung connection surfaces as a classified transport error
/// rather than a runner timeout.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 90;

/// Build the reqwest client shared by a provider.
pub(crate) fn build_client() -> Result<Client, NewsreelError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| NewsreelError::config(format!("failed to build HTTP client: {e}")))
}

/// Read a provider API key from the environment variable named in config.
pub(crate) fn api_key_from_env(section: &str, var_name: &str) -> Result<String, NewsreelError> {
    match std::env::var(var_name) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(NewsreelError::config(format!(
            "{section}: set the {var_name} environment variable"
        ))),
    }
}

/// Classify a reqwest transport error (no HTTP status available).
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> StageError {
    if err.is_timeout() {
        StageError::timeout(format!("{provider}: request timed out: {err}"))
    } else {
        StageError::transient(format!("{provider}: {err}"))
    }
}

/// Classify a non-success HTTP status.
///
/// 401/403 mean the credentials are bad for every lead, not just this one;
/// 429 and 5xx are worth retrying; any other 4xx is a problem with this
/// specific request.
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> StageError {
    let message = format!("{provider}: HTTP {status}: {}", truncate(body, 200));
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        StageError::capability(message)
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StageError::transient(message)
    } else {
        StageError::validation(message)
    }
}

/// Strip a Markdown code fence wrapper from a model response, if present.
///
/// Chat models routinely wrap requested JSON in ```json fences despite
/// instructions not to. Returns the inner content trimmed, or the trimmed
/// input when no fence is found.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid regex")
    });

    match FENCE_RE.captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(text).trim(),
        None => text.trim(),
    }
}

/// Parse a model's JSON payload after stripping any code fences.
pub(crate) fn parse_model_json<T: DeserializeOwned>(
    provider: &str,
    raw: &str,
) -> Result<T, StageError> {
    let payload = strip_code_fences(raw);
    serde_json::from_str(payload).map_err(|e| {
        StageError::validation(format!(
            "{provider}: malformed JSON in model response: {e}: {}",
            truncate(payload, 200)
        ))
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use newsreel_shared::ErrorKind;

    use super::*;

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n[{\"tip\": \"a\"}]\n```";
        assert_eq!(strip_code_fences(raw), "[{\"tip\": \"a\"}]");

        let bare = "  [1, 2, 3]  ";
        assert_eq!(strip_code_fences(bare), "[1, 2, 3]");

        let unlabeled = "```\n{\"x\": 1}\n```";
        assert_eq!(strip_code_fences(unlabeled), "{\"x\": 1}");
    }

    #[test]
    fn fence_with_surrounding_prose_is_unwrapped() {
        let raw = "Here are the results:\n```json\n{\"x\": 1}\n```\nLet me know!";
        assert_eq!(strip_code_fences(raw), "{\"x\": 1}");
    }

    #[test]
    fn status_classification() {
        let err = status_error("openai", StatusCode::UNAUTHORIZED, "bad key");
        assert_eq!(err.kind, ErrorKind::Capability);

        let err = status_error("openai", StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(err.kind, ErrorKind::Transient);

        let err = status_error("openai", StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.kind, ErrorKind::Transient);

        let err = status_error("openai", StatusCode::BAD_REQUEST, "bad payload");
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn parse_model_json_reports_snippet() {
        let err = parse_model_json::<Vec<u32>>("perplexity", "not json").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("not json"));
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        assert!(api_key_from_env("openai", "NEWSREEL_TEST_UNSET_KEY").is_err());
    }
}
