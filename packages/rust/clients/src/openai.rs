//! OpenAI client: embeddings, script writing, and speech synthesis.

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use newsreel_core::{AudioClip, Voicer, Writer};
use newsreel_index::Embedder;
use newsreel_shared::{AnchorVoice, Lead, NewsreelError, OpenAiConfig, StageError};

use crate::http;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the OpenAI embeddings, chat, and speech APIs.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    writing_temperature: f64,
    embedding_model: String,
    embedding_dimensions: usize,
    tts_model: String,
    anchors: Vec<AnchorVoice>,
}

impl OpenAiClient {
    /// Build a client from config, reading the API key from the environment.
    pub fn new(config: &OpenAiConfig) -> Result<Self, NewsreelError> {
        let api_key = http::api_key_from_env("openai", &config.api_key_env)?;
        if config.anchors.is_empty() {
            return Err(NewsreelError::config(
                "openai: at least one anchor voice is required",
            ));
        }
        Ok(Self {
            client: http::build_client()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            chat_model: config.chat_model.clone(),
            writing_temperature: config.writing_temperature,
            embedding_model: config.embedding_model.clone(),
            embedding_dimensions: config.embedding_dimensions,
            tts_model: config.tts_model.clone(),
            anchors: config.anchors.clone(),
        })
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Embedder
// ---------------------------------------------------------------------------

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StageError> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: [text],
            dimensions: self.embedding_dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error("openai", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http::status_error("openai", status, &body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| http::transport_error("openai", e))?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| StageError::validation("openai: embedding response has no data"))?;

        if vector.len() != self.embedding_dimensions {
            return Err(StageError::validation(format!(
                "openai: expected {} dimensions, got {}",
                self.embedding_dimensions,
                vector.len()
            )));
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.embedding_dimensions
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

#[async_trait]
impl Writer for OpenAiClient {
    /// Compose a broadcast script from the lead's text and research notes.
    ///
    /// The model is asked for `{headline, summary, body}`; the stored script
    /// is the headline followed by the body, ready for synthesis.
    async fn compose(&self, mut lead: Lead) -> Result<Lead, StageError> {
        let notes = lead.metadata.research_notes.as_deref().unwrap_or("");
        let system = "You are a broadcast news script writer. Respond ONLY with a \
                      JSON object {\"headline\": ..., \"summary\": ..., \"body\": ...}, \
                      no prose, no code fences. The body must read naturally when \
                      spoken aloud by a single news anchor.";
        let user = format!(
            "Write a 60-second news script for this story.\n\nStory: {}\n\nResearch notes:\n{}",
            lead.text, notes
        );

        let request = ChatRequest {
            model: &self.chat_model,
            temperature: self.writing_temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
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
            .map_err(|e| http::transport_error("openai", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http::status_error("openai", status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| http::transport_error("openai", e))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| StageError::validation("openai: response has no choices"))?;

        let draft: ScriptDraft = http::parse_model_json("openai", &content)?;
        if draft.headline.trim().is_empty() || draft.body.trim().is_empty() {
            return Err(StageError::validation(
                "openai: script draft missing headline or body",
            ));
        }

        debug!(lead_id = %lead.id, headline = %draft.headline, "script composed");
        lead.metadata.script = Some(format!("{}\n\n{}", draft.headline.trim(), draft.body.trim()));
        Ok(lead)
    }
}

// ---------------------------------------------------------------------------
// Voicer
// ---------------------------------------------------------------------------

#[async_trait]
impl Voicer for OpenAiClient {
    /// Synthesize the script with a randomly chosen anchor from the roster.
    async fn synthesize(&self, text: &str) -> Result<AudioClip, StageError> {
        if text.trim().is_empty() {
            return Err(StageError::validation("openai: nothing to synthesize"));
        }
        let anchor = self
            .anchors
            .choose(&mut rand::rng())
            .ok_or_else(|| StageError::validation("openai: anchor roster is empty"))?;

        let request = SpeechRequest {
            model: &self.tts_model,
            voice: &anchor.voice,
            input: text,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error("openai", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http::status_error("openai", status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| http::transport_error("openai", e))?;
        if bytes.is_empty() {
            return Err(StageError::validation("openai: speech response is empty"));
        }

        debug!(anchor = %anchor.name, size = bytes.len(), "audio synthesized");
        Ok(AudioClip {
            bytes: bytes.to_vec(),
            anchor: anchor.name.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
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

/// The writing model's JSON draft.
#[derive(Deserialize)]
struct ScriptDraft {
    headline: String,
    #[serde(default)]
    #[allow(dead_code)]
    summary: String,
    body: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use newsreel_shared::ErrorKind;

    use super::*;

    fn client(base_url: &str) -> OpenAiClient {
        OpenAiClient {
            client: Client::new(),
            base_url: base_url.to_string(),
            api_key: "test-key".into(),
            chat_model: "gpt-4o".into(),
            writing_temperature: 0.7,
            embedding_model: "text-embedding-3-small".into(),
            embedding_dimensions: 3,
            tts_model: "gpt-4o-mini-tts".into(),
            anchors: vec![
                AnchorVoice {
                    voice: "alloy".into(),
                    name: "Alex Morgan".into(),
                },
                AnchorVoice {
                    voice: "nova".into(),
                    name: "Nora Vale".into(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn embed_returns_the_vector() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "text-embedding-3-small",
                "dimensions": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}]
            })))
            .mount(&server)
            .await;

        let vector = client(&server.uri()).embed("some lead text").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn embed_rejects_wrong_dimensionality() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1, 0.2], "index": 0}]
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri()).embed("text").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("dimensions"));
    }

    #[tokio::test]
    async fn embed_maps_server_errors_to_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).embed("text").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transient);
    }

    #[tokio::test]
    async fn compose_builds_a_script_from_the_draft() {
        let server = MockServer::start().await;
        let draft = "```json\n{\"headline\": \"Senate Passes Budget\", \
                     \"summary\": \"s\", \"body\": \"The Senate tonight...\"}\n```";

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "gpt-4o", "temperature": 0.7})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": draft}}]
            })))
            .mount(&server)
            .await;

        let mut lead = Lead::discovered("Senate passes budget bill", "perplexity", None);
        lead.metadata.research_notes = Some("passed 52-48".into());

        let written = client(&server.uri()).compose(lead).await.unwrap();
        let script = written.metadata.script.unwrap();
        assert!(script.starts_with("Senate Passes Budget"));
        assert!(script.contains("The Senate tonight..."));
    }

    #[tokio::test]
    async fn compose_rejects_a_draft_without_a_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant",
                    "content": "{\"headline\": \"H\", \"body\": \"  \"}"}}]
            })))
            .mount(&server)
            .await;

        let lead = Lead::discovered("tip", "perplexity", None);
        let err = client(&server.uri()).compose(lead).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn synthesize_returns_audio_with_a_roster_anchor() {
        let server = MockServer::start().await;
        let mp3 = vec![0x49u8, 0x44, 0x33, 0x04];

        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini-tts", "response_format": "mp3"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(mp3.clone()))
            .mount(&server)
            .await;

        let clip = client(&server.uri())
            .synthesize("Good evening.")
            .await
            .unwrap();
        assert_eq!(clip.bytes, mp3);
        assert_eq!(clip.size_bytes(), 4);
        assert!(["Alex Morgan", "Nora Vale"].contains(&clip.anchor.as_str()));
    }

    #[tokio::test]
    async fn synthesize_rejects_empty_input_without_a_request() {
        let server = MockServer::start().await;
        // No mock mounted: a request would 404 and fail differently
        let err = client(&server.uri()).synthesize("  ").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("nothing to synthesize"));
    }

    #[tokio::test]
    async fn rejected_credentials_are_a_capability_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).synthesize("text").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Capability);
    }
}
