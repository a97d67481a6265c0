use std::{io, path::PathBuf, sync::Arc};

use thiserror::Error;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Please enter some feedback before submitting.")]
    Empty,
    #[error("feedback store unavailable: {0}")]
    Io(#[from] io::Error),
}

/// Append-only file holding one feedback entry per line.
#[derive(Clone)]
pub struct FeedbackStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FeedbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn append(&self, text: &str) -> Result<(), FeedbackError> {
        let entry = normalize_entry(text).ok_or(FeedbackError::Empty)?;

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{entry}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Trims the entry and folds line breaks so it occupies exactly one line.
fn normalize_entry(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        trimmed
            .replace("\r\n", " ")
            .replace(['\r', '\n'], " "),
    )
}
