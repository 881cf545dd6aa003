use std::time::Duration;

use ragdoc_core::error::{AppError, GENERATION_FAILED, GENERATION_UNAVAILABLE};
use serde::{Deserialize, Serialize};

use super::Llm;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Chat-completions client for Groq's OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct GroqLlm {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    timeout: Duration,
}

impl GroqLlm {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(30),
        }
    }

    /// Point at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl Llm for GroqLlm {
    fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        let req = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let resp = ureq::post(&url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .send_json(serde_json::to_value(req).map_err(|e| {
                AppError::new(GENERATION_FAILED, "Failed to encode generation request")
                    .with_details(e.to_string())
            })?);

        match resp {
            Ok(r) if r.status() == 200 => {
                let v: ChatResponse = r.into_json().map_err(|e| {
                    AppError::new(GENERATION_FAILED, "Failed to decode generation response")
                        .with_details(e.to_string())
                })?;
                let text = v
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content.trim().to_string())
                    .unwrap_or_default();
                if text.is_empty() {
                    return Err(AppError::new(
                        GENERATION_FAILED,
                        "Generation response was empty",
                    ));
                }
                Ok(text)
            }
            Ok(r) => Err(
                AppError::new(GENERATION_UNAVAILABLE, "Generation request failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(ureq::Error::Status(status, _)) => {
                // Rate limits and server-side failures are worth retrying.
                let retryable = status == 429 || status >= 500;
                Err(
                    AppError::new(GENERATION_UNAVAILABLE, "Generation request failed")
                        .with_details(format!("status={status}"))
                        .with_retryable(retryable),
                )
            }
            Err(e) => Err(
                AppError::new(GENERATION_UNAVAILABLE, "Failed to reach generation endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }
}
