use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;

use crate::{
    config::AppConfig,
    llm::LlmClient,
    ocr::{self, TextExtractor},
    pipeline::ImagePipeline,
    storage::{CredentialStore, FeedbackStore},
    translate::{self, Translator},
    web::session::SessionStore,
};

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    credentials: CredentialStore,
    feedback: FeedbackStore,
    sessions: SessionStore,
    pipeline: ImagePipeline,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.external_timeout)
            .build()
            .context("failed to build HTTP client")?;
        let llm = LlmClient::new(http.clone(), &config.llm);

        let extractor = ocr::build_extractor(&config, llm.clone());
        let translator = translate::build_translator(&config, http, llm);
        info!(
            ocr = ?config.ocr.engine,
            translator = ?config.translator.kind,
            "external engines configured"
        );

        Self::with_engines(config, extractor, translator).await
    }

    pub async fn with_engines(
        config: AppConfig,
        extractor: Arc<dyn TextExtractor>,
        translator: Arc<dyn Translator>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&config.upload_folder)
            .await
            .with_context(|| {
                format!(
                    "failed to create upload folder at {}",
                    config.upload_folder.display()
                )
            })?;

        let pipeline = ImagePipeline::new(
            extractor,
            translator,
            config.translator.target_language.clone(),
        );

        Ok(Self {
            credentials: CredentialStore::new(config.user_data_file.clone()),
            feedback: FeedbackStore::new(config.feedback_file.clone()),
            sessions: SessionStore::new(config.session_ttl_days),
            pipeline,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn feedback(&self) -> &FeedbackStore {
        &self.feedback
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn pipeline(&self) -> &ImagePipeline {
        &self.pipeline
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_folder
    }
}
