//! Chat-completions backend
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol. The saved
//! connection blob is read here and nowhere else.

use async_trait::async_trait;
use atg_core::{GenerateError, Message, TestGenerator, SYSTEM_INSTRUCTION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Endpoint used when the connection does not name one
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Request timeout (ms) when the connection does not set one
pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;

/// Environment variable consulted when the blob carries no key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Sampling temperature sent with every request
const TEMPERATURE: f32 = 1.0;

/// Fields understood in the opaque `connection` blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    pub api_key: Option<String>,
    #[serde(alias = "baseURL")]
    pub base_url: Option<String>,
    pub organization: Option<String>,
    /// Milliseconds
    pub timeout: Option<u64>,
}

impl ConnectionSettings {
    /// Read settings from the saved blob; `null` means all defaults
    ///
    /// # Errors
    /// `GenerateError::InvalidConnection` if the blob is not an object of
    /// the expected field types.
    pub fn from_value(value: &Value) -> Result<Self, GenerateError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map_err(|e| GenerateError::InvalidConnection(e.to_string()))
    }

    /// Fill a missing key from the environment value
    #[must_use]
    pub fn with_key_fallback(mut self, key: Option<String>) -> Self {
        if self.api_key.is_none() {
            self.api_key = key;
        }
        self
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// HTTP completion client
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    organization: Option<String>,
    model: String,
}

impl ChatCompletionsClient {
    /// Build a client for `model`
    ///
    /// # Errors
    /// `GenerateError::InvalidConnection` if no API key is available or the
    /// HTTP client cannot be constructed.
    pub fn new(settings: ConnectionSettings, model: impl Into<String>) -> Result<Self, GenerateError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| GenerateError::InvalidConnection("missing apiKey".to_string()))?;
        let timeout = Duration::from_millis(settings.timeout.unwrap_or(DEFAULT_TIMEOUT_MS));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerateError::InvalidConnection(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: settings.endpoint(),
            api_key,
            organization: settings.organization,
            model: model.into(),
        })
    }

    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, conversation: &[Message]) -> ChatRequest<'_> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(Message::system(SYSTEM_INSTRUCTION));
        messages.extend_from_slice(conversation);
        ChatRequest {
            model: &self.model,
            messages,
            temperature: TEMPERATURE,
        }
    }
}

#[async_trait]
impl TestGenerator for ChatCompletionsClient {
    async fn generate(&self, conversation: &[Message]) -> Result<String, GenerateError> {
        let body = self.request_body(conversation);
        tracing::debug!(model = %self.model, messages = body.messages.len(), "requesting completion");

        let mut request = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body);
        if let Some(org) = &self.organization {
            request = request.header("OpenAI-Organization", org);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerateError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerateError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(GenerateError::Api {
                status: status.as_u16(),
                message: api_error_message(&bytes),
            });
        }
        extract_completion(&bytes)
    }
}

/// Pull the first choice's text out of a response body
///
/// # Errors
/// `GenerateError::MalformedResponse` if the body has no choice or the
/// choice has no content.
pub fn extract_completion(body: &[u8]) -> Result<String, GenerateError> {
    let response: ChatResponse = serde_json::from_slice(body)
        .map_err(|e| GenerateError::MalformedResponse(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| GenerateError::MalformedResponse("no completion content".to_string()))
}

fn api_error_message(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_accept_sdk_style_blob() {
        let settings = ConnectionSettings::from_value(&json!({
            "apiKey": "sk-test",
            "baseURL": "http://localhost:8080/v1/",
            "timeout": 5000
        }))
        .unwrap();

        assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.timeout, Some(5000));
        assert_eq!(settings.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn settings_default_endpoint() {
        let settings = ConnectionSettings::from_value(&Value::Null).unwrap();
        assert_eq!(settings.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn settings_reject_non_object() {
        let err = ConnectionSettings::from_value(&json!("sk-plain-string")).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidConnection(_)));
    }

    #[test]
    fn env_key_only_fills_gaps() {
        let explicit = ConnectionSettings {
            api_key: Some("blob".into()),
            ..ConnectionSettings::default()
        }
        .with_key_fallback(Some("env".into()));
        assert_eq!(explicit.api_key.as_deref(), Some("blob"));

        let fallback = ConnectionSettings::default().with_key_fallback(Some("env".into()));
        assert_eq!(fallback.api_key.as_deref(), Some("env"));
    }

    #[test]
    fn client_requires_key() {
        let err = ChatCompletionsClient::new(ConnectionSettings::default(), "gpt-4").unwrap_err();
        assert!(matches!(err, GenerateError::InvalidConnection(_)));
    }

    #[test]
    fn request_prepends_system_instruction() {
        let settings = ConnectionSettings::default().with_key_fallback(Some("k".into()));
        let client = ChatCompletionsClient::new(settings, "gpt-4").unwrap();
        let body = client.request_body(&[Message::user("write tests")]);
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["model"], "gpt-4");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], SYSTEM_INSTRUCTION);
        assert_eq!(value["messages"][1]["content"], "write tests");
        assert_eq!(value["temperature"], 1.0);
    }

    #[test]
    fn extract_first_choice() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "test()"}}]});
        let text = extract_completion(&serde_json::to_vec(&body).unwrap()).unwrap();
        assert_eq!(text, "test()");
    }

    #[test]
    fn extract_rejects_empty_choices() {
        let err = extract_completion(br#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, GenerateError::MalformedResponse(_)));
    }

    #[test]
    fn api_error_prefers_envelope_message() {
        assert_eq!(
            api_error_message(br#"{"error": {"message": "bad key", "type": "auth"}}"#),
            "bad key"
        );
        assert_eq!(api_error_message(b"gateway timeout"), "gateway timeout");
    }
}
