//! Text extraction from stored images.
//!
//! The default engine shells out to the Tesseract CLI; the `llm` engine sends
//! the image to a vision model through the shared LLM client.

use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::{
    config::{AppConfig, OcrEngineKind},
    llm::{ChatMessage, ImageAttachment, LlmClient, LlmRequest, MessageRole},
    web::uploads::ImageKind,
};

const VISION_PROMPT: &str = "Transcribe every piece of legible text in the attached image exactly as written, preserving line breaks. Reply with the transcription only. If the image contains no text, reply with nothing.";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("could not read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to run `{program}`: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("OCR engine exited with {status}: {stderr}")]
    Engine { status: String, stderr: String },
    #[error("OCR engine did not finish within {0:?}")]
    Timeout(Duration),
    #[error("unsupported image format")]
    UnsupportedImage,
    #[error("vision model request failed: {0:#}")]
    Vision(anyhow::Error),
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Returns the text found in the image, which may be empty.
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
}

pub fn build_extractor(config: &AppConfig, llm: LlmClient) -> Arc<dyn TextExtractor> {
    match config.ocr.engine {
        OcrEngineKind::Tesseract => Arc::new(TesseractExtractor::new(
            config.ocr.tesseract_bin.clone(),
            config.ocr.tesseract_lang.clone(),
            config.external_timeout,
        )),
        OcrEngineKind::Llm => Arc::new(VisionExtractor::new(llm, config.llm.model.clone())),
    }
}

pub struct TesseractExtractor {
    binary: String,
    language: String,
    timeout: Duration,
}

impl TesseractExtractor {
    pub fn new(binary: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        debug!(binary = %self.binary, image = %path.display(), "running tesseract");

        let child = Command::new(&self.binary)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout))?
            .map_err(|source| ExtractionError::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExtractionError::Engine {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct VisionExtractor {
    llm: LlmClient,
    model: String,
}

impl VisionExtractor {
    pub fn new(llm: LlmClient, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextExtractor for VisionExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ExtractionError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let kind = ImageKind::sniff(&bytes).ok_or(ExtractionError::UnsupportedImage)?;

        let request = LlmRequest::new(
            self.model.clone(),
            vec![ChatMessage::new(MessageRole::User, VISION_PROMPT)],
        )
        .with_images(vec![ImageAttachment::new(
            kind.content_type().essence_str(),
            bytes,
        )]);

        let response = self
            .llm
            .execute(request)
            .await
            .map_err(ExtractionError::Vision)?;
        debug!(provider = %response.provider, model = %response.model, "vision transcription received");

        Ok(response.text)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn extractor(binary: &str) -> TesseractExtractor {
        TesseractExtractor::new(binary, "eng", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn returns_engine_stdout() {
        // `echo` stands in for tesseract and prints its own argument list.
        let text = extractor("echo")
            .extract(Path::new("scan.png"))
            .await
            .unwrap();
        assert_eq!(text.trim(), "scan.png stdout -l eng");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_engine_error() {
        let err = extractor("false")
            .extract(Path::new("scan.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Engine { .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let err = extractor("definitely-not-an-ocr-binary")
            .extract(Path::new("scan.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Spawn { .. }));
        assert!(err.to_string().contains("definitely-not-an-ocr-binary"));
    }

    #[tokio::test]
    async fn vision_engine_rejects_non_images_before_calling_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"just some text").unwrap();

        let settings = crate::config::LlmSettings {
            model: "openrouter/test".into(),
            openrouter_api_key: None,
            poe_api_key: None,
        };
        let llm = LlmClient::new(reqwest::Client::new(), &settings);
        let err = VisionExtractor::new(llm, "openrouter/test")
            .extract(&path)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedImage));
    }
}
