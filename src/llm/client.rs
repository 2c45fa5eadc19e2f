use crate::error::{AnalysisError, Result};
use crate::llm::prompts;
use crate::llm::types::*;
use crate::summary::{SummaryGenerator, SummaryPayload};
use reqwest::blocking::Client;
use std::time::Duration;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f64 = 0.4;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_TOKENS: u32 = 600;

/// Blocking OpenAI chat-completions client used as a [`SummaryGenerator`].
///
/// Requests run with a bounded timeout so the pipeline never hangs on the
/// remote side; any transport or API failure surfaces as
/// [`AnalysisError::ExternalUnavailable`] and the caller falls back to the
/// template summary.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_options(
            api_key,
            DEFAULT_MODEL.to_string(),
            DEFAULT_TEMPERATURE,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_options(
        api_key: String,
        model: String,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::ExternalUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            model,
            temperature,
        })
    }

    /// Point the client at a different endpoint, mainly for tests and proxies.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: Some(MAX_TOKENS),
        };

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| AnalysisError::ExternalUnavailable(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res
                .text()
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AnalysisError::ExternalUnavailable(format!(
                "OpenAI API error (status {}): {}",
                status, err_text
            )));
        }

        let body: ChatCompletionResponse = res
            .json()
            .map_err(|e| AnalysisError::ExternalUnavailable(e.to_string()))?;

        body.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                AnalysisError::ExternalUnavailable("empty completion returned".to_string())
            })
    }
}

impl SummaryGenerator for OpenAiClient {
    fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, payload: &SummaryPayload) -> Result<String> {
        log::debug!(
            "requesting summary for '{}' from model {}",
            payload.group,
            self.model
        );
        let messages = vec![
            ChatMessage::system(prompts::SYSTEM_PROMPT),
            ChatMessage::user(prompts::user_prompt(payload)?),
        ];
        self.chat(messages)
    }
}
