use std::{env, net::IpAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow, bail};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_USER_DATA_FILE: &str = "users.txt";
const DEFAULT_FEEDBACK_FILE: &str = "feedback.txt";
const DEFAULT_UPLOAD_FOLDER: &str = "uploads";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_SESSION_TTL_DAYS: i64 = 7;
const DEFAULT_TESSERACT_BIN: &str = "tesseract";
const DEFAULT_TESSERACT_LANG: &str = "eng";
const DEFAULT_LIBRETRANSLATE_URL: &str = "http://127.0.0.1:5001";
const DEFAULT_TRANSLATION_TARGET: &str = "en";
const DEFAULT_LLM_MODEL: &str = "openrouter/openai/gpt-4o-mini";
const DEFAULT_EXTERNAL_TIMEOUT_SECS: u64 = 60;

/// Which OCR backend handles text extraction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OcrEngineKind {
    Tesseract,
    Llm,
}

impl OcrEngineKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Ok(Self::Tesseract),
            "llm" => Ok(Self::Llm),
            other => bail!("unsupported OCR_ENGINE `{other}` (expected `tesseract` or `llm`)"),
        }
    }
}

/// Which backend handles translation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranslatorKind {
    LibreTranslate,
    Llm,
}

impl TranslatorKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "libretranslate" => Ok(Self::LibreTranslate),
            "llm" => Ok(Self::Llm),
            other => {
                bail!("unsupported TRANSLATOR `{other}` (expected `libretranslate` or `llm`)")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct OcrSettings {
    pub engine: OcrEngineKind,
    pub tesseract_bin: String,
    pub tesseract_lang: String,
}

#[derive(Clone, Debug)]
pub struct TranslatorSettings {
    pub kind: TranslatorKind,
    pub libretranslate_url: String,
    pub libretranslate_api_key: Option<String>,
    pub target_language: String,
}

#[derive(Clone, Debug)]
pub struct LlmSettings {
    pub model: String,
    pub openrouter_api_key: Option<String>,
    pub poe_api_key: Option<String>,
}

/// Process-wide settings, read once at start-up.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub debug: bool,
    pub user_data_file: PathBuf,
    pub feedback_file: PathBuf,
    pub upload_folder: PathBuf,
    pub max_upload_bytes: usize,
    pub session_ttl_days: i64,
    pub external_timeout: Duration,
    pub ocr: OcrSettings,
    pub translator: TranslatorSettings,
    pub llm: LlmSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = get("HOST")
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
            .parse::<IpAddr>()
            .context("HOST must be an IP address")?;
        let port = parse_or(get("PORT"), DEFAULT_PORT).context("PORT must be a port number")?;
        let debug = get("DEBUG").map(|value| parse_flag(&value)).unwrap_or(false);

        let max_upload_bytes = parse_or(get("MAX_UPLOAD_BYTES"), DEFAULT_MAX_UPLOAD_BYTES)
            .context("MAX_UPLOAD_BYTES must be a byte count")?;
        let session_ttl_days = parse_or(get("SESSION_TTL_DAYS"), DEFAULT_SESSION_TTL_DAYS)
            .context("SESSION_TTL_DAYS must be an integer")?;
        if session_ttl_days <= 0 {
            return Err(anyhow!("SESSION_TTL_DAYS must be positive"));
        }
        let timeout_secs = parse_or(get("EXTERNAL_TIMEOUT_SECS"), DEFAULT_EXTERNAL_TIMEOUT_SECS)
            .context("EXTERNAL_TIMEOUT_SECS must be a number of seconds")?;

        let ocr = OcrSettings {
            engine: match get("OCR_ENGINE") {
                Some(value) => OcrEngineKind::parse(&value)?,
                None => OcrEngineKind::Tesseract,
            },
            tesseract_bin: get("TESSERACT_BIN").unwrap_or_else(|| DEFAULT_TESSERACT_BIN.into()),
            tesseract_lang: get("TESSERACT_LANG").unwrap_or_else(|| DEFAULT_TESSERACT_LANG.into()),
        };

        let translator = TranslatorSettings {
            kind: match get("TRANSLATOR") {
                Some(value) => TranslatorKind::parse(&value)?,
                None => TranslatorKind::LibreTranslate,
            },
            libretranslate_url: get("LIBRETRANSLATE_URL")
                .unwrap_or_else(|| DEFAULT_LIBRETRANSLATE_URL.into()),
            libretranslate_api_key: get("LIBRETRANSLATE_API_KEY"),
            target_language: get("TRANSLATION_TARGET")
                .unwrap_or_else(|| DEFAULT_TRANSLATION_TARGET.into()),
        };

        let llm = LlmSettings {
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.into()),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            poe_api_key: get("POE_API_KEY"),
        };

        Ok(Self {
            host,
            port,
            debug,
            user_data_file: get("USER_DATA_FILE")
                .unwrap_or_else(|| DEFAULT_USER_DATA_FILE.into())
                .into(),
            feedback_file: get("FEEDBACK_FILE")
                .unwrap_or_else(|| DEFAULT_FEEDBACK_FILE.into())
                .into(),
            upload_folder: get("UPLOAD_FOLDER")
                .unwrap_or_else(|| DEFAULT_UPLOAD_FOLDER.into())
                .into(),
            max_upload_bytes,
            session_ttl_days,
            external_timeout: Duration::from_secs(timeout_secs),
            ocr,
            translator,
            llm,
        })
    }
}

fn parse_or<T>(value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value `{raw}`")),
        None => Ok(default),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.host.to_string(), "127.0.0.1");
        assert!(!config.debug);
        assert_eq!(config.user_data_file, PathBuf::from("users.txt"));
        assert_eq!(config.feedback_file, PathBuf::from("feedback.txt"));
        assert_eq!(config.upload_folder, PathBuf::from("uploads"));
        assert_eq!(config.ocr.engine, OcrEngineKind::Tesseract);
        assert_eq!(config.translator.kind, TranslatorKind::LibreTranslate);
        assert_eq!(config.translator.target_language, "en");
        assert_eq!(config.session_ttl_days, 7);
    }

    #[test]
    fn overrides_are_read() {
        let config = config_from(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("DEBUG", "true"),
            ("OCR_ENGINE", "LLM"),
            ("TRANSLATOR", "llm"),
            ("UPLOAD_FOLDER", "/tmp/images"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.debug);
        assert_eq!(config.ocr.engine, OcrEngineKind::Llm);
        assert_eq!(config.translator.kind, TranslatorKind::Llm);
        assert_eq!(config.upload_folder, PathBuf::from("/tmp/images"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("PORT", "  "), ("TESSERACT_LANG", "")]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.ocr.tesseract_lang, "eng");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("OCR_ENGINE", "paddle")]).is_err());
        assert!(config_from(&[("TRANSLATOR", "google")]).is_err());
        assert!(config_from(&[("SESSION_TTL_DAYS", "0")]).is_err());
    }
}
