//! Perplexity client: lead discovery and per-lead research.
//!
//! Both roles go through the chat completions API with the configured
//! `sonar` model. Discovery asks for a strict-JSON array of tips per
//! category; research asks for plain-text context on one lead.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use newsreel_core::{Discoverer, Researcher};
use newsreel_shared::{DiscoveryConfig, Lead, NewsreelError, PerplexityConfig, StageError};

use crate::http;

const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

/// Client for the Perplexity chat completions API.
pub struct PerplexityClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    categories: Vec<String>,
    max_leads_per_category: u32,
}

impl PerplexityClient {
    /// Build a client from config, reading the API key from the environment.
    pub fn new(
        config: &PerplexityConfig,
        discovery: &DiscoveryConfig,
    ) -> Result<Self, NewsreelError> {
        let api_key = http::api_key_from_env("perplexity", &config.api_key_env)?;
        Ok(Self {
            client: http::build_client()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: config.model.clone(),
            categories: discovery.categories.clone(),
            max_leads_per_category: discovery.max_leads_per_category,
        })
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One chat completion round trip, returning the assistant's content.
    async fn chat(&self, system: &str, user: &str) -> Result<String, StageError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error("perplexity", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http::status_error("perplexity", status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| http::transport_error("perplexity", e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| StageError::validation("perplexity: response has no choices"))
    }

    async fn discover_category(&self, category: &str) -> Result<Vec<Lead>, StageError> {
        let system = "You are a news desk assistant. Respond ONLY with a JSON array, \
                      no prose, no code fences.";
        let user = format!(
            "List up to {count} significant news developments from the last 24 hours \
             in the category \"{category}\". Each array element must be an object \
             {{\"tip\": \"one-sentence summary\", \"category\": \"{category}\"}}. \
             Only include developments you are confident actually happened.",
            count = self.max_leads_per_category,
        );

        let content = self.chat(system, &user).await?;
        let tips: Vec<TipItem> = http::parse_model_json("perplexity", &content)?;

        let leads: Vec<Lead> = tips
            .into_iter()
            .filter(|t| !t.tip.trim().is_empty())
            .take(self.max_leads_per_category as usize)
            .map(|t| {
                Lead::discovered(
                    t.tip.trim(),
                    "perplexity",
                    t.category.or_else(|| Some(category.to_string())),
                )
            })
            .collect();

        debug!(category, count = leads.len(), "category discovered");
        Ok(leads)
    }
}

#[async_trait]
impl Discoverer for PerplexityClient {
    /// Query every configured category, tolerating individual category
    /// failures as long as at least one produces leads. Only when all
    /// categories fail does discovery itself fail.
    async fn discover(&self) -> Result<Vec<Lead>, StageError> {
        let mut leads = Vec::new();
        let mut last_error: Option<StageError> = None;

        for category in &self.categories {
            match self.discover_category(category).await {
                Ok(found) => leads.extend(found),
                Err(err) => {
                    warn!(category, kind = %err.kind, error = %err.message, "category discovery failed");
                    let fatal = err.kind == newsreel_shared::ErrorKind::Capability;
                    last_error = Some(err);
                    if fatal {
                        break;
                    }
                }
            }
        }

        if leads.is_empty() {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        info!(count = leads.len(), "discovery complete");
        Ok(leads)
    }
}

#[async_trait]
impl Researcher for PerplexityClient {
    async fn enrich(&self, mut lead: Lead) -> Result<Lead, StageError> {
        let system = "You are a news researcher. Provide factual background \
                      context in plain text, no markup.";
        let user = format!(
            "Research this news development and summarize the key facts, \
             names, figures, and context a script writer would need, in under \
             300 words:\n\n{}",
            lead.text
        );

        let notes = self.chat(system, &user).await?;
        if notes.trim().is_empty() {
            return Err(StageError::validation(
                "perplexity: research returned empty notes",
            ));
        }
        lead.metadata.research_notes = Some(notes.trim().to_string());
        Ok(lead)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

/// One discovered tip in the model's JSON array.
#[derive(Deserialize)]
struct TipItem {
    tip: String,
    #[serde(default)]
    category: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use newsreel_shared::ErrorKind;

    use super::*;

    fn client(base_url: &str) -> PerplexityClient {
        PerplexityClient {
            client: Client::new(),
            base_url: base_url.to_string(),
            api_key: "test-key".into(),
            model: "sonar-pro".into(),
            categories: vec!["politics".into(), "science".into()],
            max_leads_per_category: 3,
        }
    }

    fn chat_body(content: &str) -> serde_json::Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn discover_parses_fenced_tip_arrays() {
        let server = MockServer::start().await;
        let tips = "```json\n[{\"tip\": \"Senate passes budget bill\", \
                    \"category\": \"politics\"}, {\"tip\": \"Court ruling on tariffs\"}]\n```";

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(tips)))
            .mount(&server)
            .await;

        let leads = client(&server.uri()).discover().await.unwrap();

        // Two categories, same mocked answer for each
        assert_eq!(leads.len(), 4);
        assert_eq!(leads[0].text, "Senate passes budget bill");
        assert_eq!(leads[0].metadata.source, "perplexity");
        assert_eq!(leads[0].metadata.category.as_deref(), Some("politics"));
        // Tip without a category inherits the queried one
        assert_eq!(leads[3].metadata.category.as_deref(), Some("science"));
    }

    #[tokio::test]
    async fn discover_requests_the_configured_model() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "sonar-pro"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("[]")))
            .expect(2)
            .mount(&server)
            .await;

        let leads = client(&server.uri()).discover().await.unwrap();
        assert!(leads.is_empty());
    }

    #[tokio::test]
    async fn malformed_tip_json_fails_every_category() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("no json here")))
            .mount(&server)
            .await;

        let err = client(&server.uri()).discover().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn rejected_credentials_stop_after_one_category() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server.uri()).discover().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Capability);
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).discover().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transient);
    }

    #[tokio::test]
    async fn enrich_fills_research_notes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body("The bill passed 52-48 after a late amendment.")),
            )
            .mount(&server)
            .await;

        let lead = Lead::discovered("Senate passes budget bill", "perplexity", None);
        let enriched = client(&server.uri()).enrich(lead).await.unwrap();
        assert_eq!(
            enriched.metadata.research_notes.as_deref(),
            Some("The bill passed 52-48 after a late amendment.")
        );
    }

    #[tokio::test]
    async fn empty_research_notes_are_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("   ")))
            .mount(&server)
            .await;

        let lead = Lead::discovered("tip", "perplexity", None);
        let err = client(&server.uri()).enrich(lead).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
