use std::{path::Path, sync::Arc};

use thiserror::Error;

use crate::{
    ocr::{ExtractionError, TextExtractor},
    translate::{AUTO_DETECT, TranslationError, Translator},
};

/// Result of running an uploaded image through OCR and translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// OCR succeeded but found nothing; translation was skipped.
    NoText,
    Translated { extracted: String, translated: String },
}

/// Failure tagged with the stage that produced it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Error extracting text from the image: {0}")]
    Extraction(#[from] ExtractionError),
    /// Translation failed after OCR produced `extracted`.
    #[error("Error translating the extracted text: {source}")]
    Translation {
        extracted: String,
        #[source]
        source: TranslationError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Extraction(_) => "extraction",
            PipelineError::Translation { .. } => "translation",
        }
    }

    /// Text recognised before the failure, if OCR got that far.
    pub fn extracted(&self) -> Option<&str> {
        match self {
            PipelineError::Extraction(_) => None,
            PipelineError::Translation { extracted, .. } => Some(extracted),
        }
    }
}

#[derive(Clone)]
pub struct ImagePipeline {
    extractor: Arc<dyn TextExtractor>,
    translator: Arc<dyn Translator>,
    target_language: String,
}

impl ImagePipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        translator: Arc<dyn Translator>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            extractor,
            translator,
            target_language: target_language.into(),
        }
    }

    pub async fn process(&self, image: &Path) -> Result<PipelineOutcome, PipelineError> {
        let raw = self.extractor.extract(image).await?;
        let extracted = raw.trim();
        if extracted.is_empty() {
            return Ok(PipelineOutcome::NoText);
        }

        let translated = match self
            .translator
            .translate(extracted, &self.target_language, AUTO_DETECT)
            .await
        {
            Ok(translated) => translated,
            Err(source) => {
                return Err(PipelineError::Translation {
                    extracted: extracted.to_string(),
                    source,
                });
            }
        };

        Ok(PipelineOutcome::Translated {
            extracted: extracted.to_string(),
            translated,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FixedExtractor, RecordingTranslator};
    use super::*;

    fn pipeline(
        extractor: FixedExtractor,
        translator: Arc<RecordingTranslator>,
    ) -> ImagePipeline {
        ImagePipeline::new(Arc::new(extractor), translator, "en")
    }

    #[tokio::test]
    async fn translates_extracted_text_with_auto_detection() {
        let translator = Arc::new(RecordingTranslator::default());
        let outcome = pipeline(FixedExtractor::text("  hola mundo\n"), translator.clone())
            .process(Path::new("x.png"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::Translated {
                extracted: "hola mundo".into(),
                translated: "[auto->en] hola mundo".into(),
            }
        );
        assert_eq!(translator.call_count(), 1);
    }

    #[tokio::test]
    async fn blank_text_skips_translation() {
        let translator = Arc::new(RecordingTranslator::default());
        let outcome = pipeline(FixedExtractor::text(" \n\t\x0c"), translator.clone())
            .process(Path::new("x.png"))
            .await
            .unwrap();

        assert_eq!(outcome, PipelineOutcome::NoText);
        assert_eq!(translator.call_count(), 0);
    }

    #[tokio::test]
    async fn failures_carry_their_stage() {
        let translator = Arc::new(RecordingTranslator::default());
        let err = pipeline(FixedExtractor::failing(), translator.clone())
            .process(Path::new("x.png"))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "extraction");
        assert!(err.to_string().starts_with("Error extracting text"));
        assert_eq!(err.extracted(), None);
        assert_eq!(translator.call_count(), 0);

        let err = pipeline(
            FixedExtractor::text("bonjour"),
            Arc::new(RecordingTranslator::failing()),
        )
        .process(Path::new("x.png"))
        .await
        .unwrap_err();
        assert_eq!(err.stage(), "translation");
        assert!(err.to_string().starts_with("Error translating"));
        assert_eq!(err.extracted(), Some("bonjour"));
    }
}
