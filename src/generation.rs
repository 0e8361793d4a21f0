use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::error::GenerationError;
use crate::metrics::GENERATION_FAILURES;
use crate::models::{ChatMessage, Role, UserProfile};
use crate::prompt::{self, SYSTEM_PROMPT};
use crate::retry::{RetryPolicy, with_retries};

// Sampling temperature for the conversational path
const CHAT_TEMPERATURE: f32 = 0.7;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// One message on the upstream wire
#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<InlineImage>,
}

#[derive(Debug, Clone, Serialize)]
struct InlineImage {
    mime_type: String,
    data: String,
}

// Generation API request format
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    system: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// Generation API response format
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

pub struct ChatResult {
    pub text: String,
    pub history: Vec<ChatMessage>,
}

// Client for the external generation service. One outbound call, wrapped in
// the retry budget; the parameter bundle is opaque to the wrapper.
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl GenerationClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.generation_url.clone(),
            api_key: config.generation_api_key.clone(),
            model: config.model.clone(),
            retry: RetryPolicy::new(config.max_retries, config.retry_base),
        }
    }

    // Single attempt against the upstream API
    async fn generate_once(&self, request: &GenerateRequest) -> Result<String, GenerationError> {
        let response = self
            .http
            .post(format!("{}/v1/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.text)
    }

    // Full attempt budget around one call. Retrying is not guaranteed
    // idempotent upstream; accepted tradeoff.
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenerationError> {
        let result = with_retries(&self.retry, || self.generate_once(&request)).await;
        if result.is_err() {
            GENERATION_FAILURES.inc();
        }
        result
    }

    // Conversational recommendation. The profile context rides on the first
    // user message of a new conversation, never on follow-ups.
    pub async fn recommend(
        &self,
        message: &str,
        profile: &UserProfile,
        history: Vec<ChatMessage>,
    ) -> Result<ChatResult, GenerationError> {
        let context = prompt::format_user_context(profile);

        let mut messages: Vec<WireMessage> = history
            .iter()
            .map(|m| WireMessage {
                role: m.role,
                content: m.content.clone(),
                image: None,
            })
            .collect();

        let contextual_message = if messages.is_empty() && !context.is_empty() {
            format!("{}\n\nQuestion: {}", context, message)
        } else {
            message.to_string()
        };
        messages.push(WireMessage {
            role: Role::User,
            content: contextual_message.clone(),
            image: None,
        });

        let text = self
            .generate(GenerateRequest {
                model: self.model.clone(),
                system: SYSTEM_PROMPT.to_string(),
                messages,
                temperature: Some(CHAT_TEMPERATURE),
            })
            .await?;

        let mut new_history = history;
        new_history.push(ChatMessage {
            role: Role::User,
            content: contextual_message,
        });
        new_history.push(ChatMessage {
            role: Role::Assistant,
            content: text.clone(),
        });

        Ok(ChatResult {
            text,
            history: new_history,
        })
    }

    // Vision path for a photo of the user's skin
    pub async fn analyze_image(
        &self,
        image_base64: &str,
        mime_type: &str,
        profile: &UserProfile,
    ) -> Result<String, GenerationError> {
        let context = prompt::format_user_context(profile);
        let data = strip_data_url(image_base64);

        let message = WireMessage {
            role: Role::User,
            content: prompt::analyze_prompt(&context),
            image: Some(InlineImage {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            }),
        };

        self.generate(GenerateRequest {
            model: self.model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![message],
            temperature: None,
        })
        .await
    }
}

// "data:image/png;base64,AAAA" -> "AAAA"; plain base64 passes through
pub fn strip_data_url(image: &str) -> &str {
    if image.starts_with("data:") {
        image.split_once(',').map(|(_, data)| data).unwrap_or(image)
    } else {
        image
    }
}

// MIME type out of a data URL, image/jpeg when it cannot be told
pub fn mime_from_data_url(image: &str) -> &str {
    image
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64").map(|(mime, _)| mime))
        .filter(|mime| !mime.is_empty())
        .unwrap_or("image/jpeg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_is_stripped() {
        assert_eq!(strip_data_url("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("AAAA"), "AAAA");
        assert_eq!(strip_data_url("data:broken-no-comma"), "data:broken-no-comma");
    }

    #[test]
    fn mime_type_read_from_data_url() {
        assert_eq!(mime_from_data_url("data:image/png;base64,AAAA"), "image/png");
        assert_eq!(mime_from_data_url("data:image/webp;base64,BBBB"), "image/webp");
        // plain base64 falls back to jpeg, like the upload widget sends it
        assert_eq!(mime_from_data_url("AAAA"), "image/jpeg");
        assert_eq!(mime_from_data_url("data:;base64,AAAA"), "image/jpeg");
    }

    #[test]
    fn wire_message_omits_absent_image() {
        let message = WireMessage {
            role: Role::User,
            content: "hello".to_string(),
            image: None,
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "user");
        assert!(value.get("image").is_none());
    }

    #[test]
    fn wire_message_inlines_image_payload() {
        let message = WireMessage {
            role: Role::User,
            content: "analyze".to_string(),
            image: Some(InlineImage {
                mime_type: "image/png".to_string(),
                data: "AAAA".to_string(),
            }),
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["image"]["mime_type"], "image/png");
        assert_eq!(value["image"]["data"], "AAAA");
    }
}
