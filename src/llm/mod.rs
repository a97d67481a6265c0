use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::LlmSettings;

/// Enumerates the supported LLM backends behind the shared client.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LlmProvider {
    OpenRouter,
    Poe,
}

impl LlmProvider {
    fn endpoint(self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            LlmProvider::Poe => "https://api.poe.com/v1/chat/completions",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::OpenRouter => write!(f, "openrouter"),
            LlmProvider::Poe => write!(f, "poe"),
        }
    }
}

/// A chat-style interaction, optionally carrying images for the last user turn.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub images: Vec<ImageAttachment>,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    pub fn new(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes,
        }
    }

    fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            BASE64.encode(&self.bytes)
        )
    }
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub provider: LlmProvider,
    pub model: String,
}

/// Main entry point for invoking providers.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    openrouter_api_key: Option<String>,
    poe_api_key: Option<String>,
}

impl LlmClient {
    pub fn new(http: Client, settings: &LlmSettings) -> Self {
        Self {
            http,
            openrouter_api_key: settings.openrouter_api_key.clone(),
            poe_api_key: settings.poe_api_key.clone(),
        }
    }

    /// Execute a request against the provider encoded in the model name.
    pub async fn execute(&self, request: LlmRequest) -> Result<LlmResponse> {
        let (provider, provider_model) = parse_model_provider(&request.model)?;
        let api_key = self.api_key(provider)?;

        let payload = json!({
            "model": provider_model,
            "messages": build_messages(&request),
        });

        let response = self
            .http
            .post(provider.endpoint())
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("{provider} request failed"))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("failed to read response body")?;
        let body: Value = serde_json::from_str(&response_text).with_context(|| {
            let preview: String = response_text.chars().take(500).collect();
            format!("failed to parse {provider} response as JSON. Response body: {preview}")
        })?;
        if !status.is_success() {
            bail!("{provider} call failed with status {status}: {body}");
        }

        let text = extract_text(&body)
            .ok_or_else(|| anyhow!("unexpected {provider} response payload: {body}"))?;

        Ok(LlmResponse {
            text,
            provider,
            model: provider_model.to_string(),
        })
    }

    fn api_key(&self, provider: LlmProvider) -> Result<&str> {
        let key = match provider {
            LlmProvider::OpenRouter => self.openrouter_api_key.as_deref(),
            LlmProvider::Poe => self.poe_api_key.as_deref(),
        };
        key.ok_or_else(|| match provider {
            LlmProvider::OpenRouter => {
                anyhow!("OPENROUTER_API_KEY is not configured but required for OpenRouter requests")
            }
            LlmProvider::Poe => anyhow!("POE_API_KEY is not configured but required for Poe requests"),
        })
    }
}

/// Builds OpenAI-format messages; images are pinned to the last user turn.
fn build_messages(request: &LlmRequest) -> Vec<Value> {
    let mut messages: Vec<Value> = request
        .messages
        .iter()
        .map(|msg| {
            if request.images.is_empty() {
                json!({ "role": msg.role.as_str(), "content": msg.text })
            } else {
                json!({
                    "role": msg.role.as_str(),
                    "content": [{ "type": "text", "text": msg.text }],
                })
            }
        })
        .collect();

    if request.images.is_empty() {
        return messages;
    }

    let target = match messages
        .iter()
        .rposition(|m| m.get("role").and_then(Value::as_str) == Some("user"))
    {
        Some(idx) => idx,
        None => {
            messages.push(json!({ "role": "user", "content": [] }));
            messages.len() - 1
        }
    };

    if let Some(content) = messages[target]
        .get_mut("content")
        .and_then(Value::as_array_mut)
    {
        for image in &request.images {
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": image.data_url() },
            }));
        }
    }

    messages
}

fn extract_text(value: &Value) -> Option<String> {
    let chat = serde_json::from_value::<ChatCompletionPayload>(value.clone()).ok()?;
    if chat.choices.is_empty() {
        return None;
    }
    Some(
        chat.choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default(),
    )
}

fn parse_model_provider(model: &str) -> Result<(LlmProvider, &str)> {
    let (provider, name) = model.split_once('/').ok_or_else(|| {
        anyhow!("model must be prefixed with provider, e.g. 'openrouter/openai/gpt-4o'")
    })?;

    if name.trim().is_empty() {
        bail!("model name is required after provider prefix");
    }

    match provider {
        "openrouter" => Ok((LlmProvider::OpenRouter, name)),
        "poe" => Ok((LlmProvider::Poe, name)),
        other => bail!("unsupported provider prefix: {other}"),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPayload {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
