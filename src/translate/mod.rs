use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::{AppConfig, TranslatorKind},
    llm::{ChatMessage, LlmClient, LlmRequest, MessageRole},
};

/// Source language placeholder asking the engine to detect it.
pub const AUTO_DETECT: &str = "auto";

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("there is no text to translate")]
    EmptyInput,
    #[error("translation service unreachable: {0}")]
    Request(#[from] reqwest::Error),
    #[error("translation service returned {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("translation service returned an unexpected response")]
    UnexpectedResponse,
    #[error("translation model request failed: {0:#}")]
    Model(anyhow::Error),
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        target: &str,
        source: &str,
    ) -> Result<String, TranslationError>;
}

pub fn build_translator(config: &AppConfig, http: Client, llm: LlmClient) -> Arc<dyn Translator> {
    match config.translator.kind {
        TranslatorKind::LibreTranslate => Arc::new(LibreTranslateClient::new(
            http,
            config.translator.libretranslate_url.clone(),
            config.translator.libretranslate_api_key.clone(),
            config.external_timeout,
        )),
        TranslatorKind::Llm => Arc::new(LlmTranslator::new(llm, config.llm.model.clone())),
    }
}

/// Client for any LibreTranslate-compatible `/translate` endpoint.
pub struct LibreTranslateClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl LibreTranslateClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/translate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct LibreTranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct LibreTranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Deserialize)]
struct LibreTranslateFailure {
    error: String,
}

#[async_trait]
impl Translator for LibreTranslateClient {
    async fn translate(
        &self,
        text: &str,
        target: &str,
        source: &str,
    ) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Err(TranslationError::EmptyInput);
        }

        let payload = LibreTranslateRequest {
            q: text,
            source,
            target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .http
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<LibreTranslateFailure>(&body)
                .map(|failure| failure.error)
                .unwrap_or(body);
            return Err(TranslationError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str::<LibreTranslateResponse>(&body)
            .map(|parsed| parsed.translated_text)
            .map_err(|_| TranslationError::UnexpectedResponse)
    }
}

/// Translates through a chat model, letting it detect the source language.
pub struct LlmTranslator {
    llm: LlmClient,
    model: String,
}

impl LlmTranslator {
    pub fn new(llm: LlmClient, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

fn build_translation_prompt(target: &str, source: &str) -> String {
    let source_clause = if source == AUTO_DETECT {
        "Detect the source language automatically.".to_string()
    } else {
        format!("The source language code is `{source}`.")
    };
    format!(
        "You are a translation engine. {source_clause} Translate the user's text into the language with code `{target}`. Preserve line breaks. Reply with the translation only, without commentary or quotation marks."
    )
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(
        &self,
        text: &str,
        target: &str,
        source: &str,
    ) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Err(TranslationError::EmptyInput);
        }

        let request = LlmRequest::new(
            self.model.clone(),
            vec![
                ChatMessage::new(MessageRole::System, build_translation_prompt(target, source)),
                ChatMessage::new(MessageRole::User, text),
            ],
        );

        let response = self
            .llm
            .execute(request)
            .await
            .map_err(TranslationError::Model)?;
        let translated = response.text.trim().to_string();
        if translated.is_empty() {
            return Err(TranslationError::UnexpectedResponse);
        }
        Ok(translated)
    }
}
