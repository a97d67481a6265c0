use std::{
    io,
    path::{Path, PathBuf},
};

use axum::extract::Multipart;
use thiserror::Error;
use tokio::{fs::File, io::AsyncWriteExt};

/// Extensions accepted for image uploads, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Errors returned when validating or persisting an uploaded image.
///
/// The display text is shown to the user as-is.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file part")]
    NoFile,
    #[error("No selected file")]
    EmptyFilename,
    #[error("Invalid file type. Only image files are allowed (png, jpg, jpeg, gif).")]
    DisallowedType,
    #[error("The uploaded file is not a valid PNG, JPEG or GIF image.")]
    UnrecognizedContent,
    #[error("Could not read the upload: {0}")]
    Multipart(String),
    #[error("Could not save the upload: {0}")]
    Io(#[from] io::Error),
}

impl UploadError {
    /// Whether the failure lies with the server rather than the submitted file.
    pub fn is_internal(&self) -> bool {
        matches!(self, UploadError::Io(_))
    }
}

/// Image families recognised by their leading signature bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
}

impl ImageKind {
    /// Image family named by an allowed extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }

    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageKind::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else {
            None
        }
    }

    pub fn content_type(self) -> mime::Mime {
        match self {
            ImageKind::Png => mime::IMAGE_PNG,
            ImageKind::Jpeg => mime::IMAGE_JPEG,
            ImageKind::Gif => mime::IMAGE_GIF,
        }
    }
}

/// Metadata describing a stored upload on disk.
#[derive(Debug, Clone)]
pub struct SavedImage {
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub kind: ImageKind,
    pub file_size: u64,
}

/// Returns the lowercase extension when it is on the allow-list.
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let (_, extension) = file_name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// Strips path components and unsafe characters from a client filename.
///
/// Whitespace becomes `_` and leading dots are dropped so the result can never
/// be hidden or escape the upload directory. Falls back to `upload.<ext>`
/// when nothing usable is left.
pub fn secure_image_name(original: &str, extension: &str) -> String {
    let cleaned: String = sanitize_filename::sanitize(original)
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    let keeps_extension = Path::new(cleaned)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    let has_stem = Path::new(cleaned)
        .file_stem()
        .is_some_and(|stem| !stem.is_empty());

    if keeps_extension && has_stem {
        cleaned.to_string()
    } else {
        format!("upload.{extension}")
    }
}

/// Checks that the leading bytes carry the signature of the family the
/// extension names.
pub fn verify_content(extension: &str, bytes: &[u8]) -> Result<ImageKind, UploadError> {
    match (ImageKind::from_extension(extension), ImageKind::sniff(bytes)) {
        (Some(expected), Some(found)) if expected == found => Ok(found),
        _ => Err(UploadError::UnrecognizedContent),
    }
}

/// Ensures the destination directory exists.
pub async fn ensure_directory(path: &Path) -> Result<(), UploadError> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

/// Reads the multipart form, validates the image in `field_name` and writes
/// it into `dest_dir`, replacing any file with the same sanitized name.
pub async fn accept_image(
    mut multipart: Multipart,
    dest_dir: &Path,
    field_name: &str,
) -> Result<SavedImage, UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::Multipart(err.to_string()))?
    {
        if field.name() != Some(field_name) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        if original_name.trim().is_empty() {
            return Err(UploadError::EmptyFilename);
        }

        let extension = allowed_extension(&original_name).ok_or(UploadError::DisallowedType)?;

        let bytes = field
            .bytes()
            .await
            .map_err(|err| UploadError::Multipart(err.to_string()))?;
        let kind = verify_content(&extension, &bytes)?;

        ensure_directory(dest_dir).await?;
        let stored_name = secure_image_name(&original_name, &extension);
        let stored_path = dest_dir.join(&stored_name);

        let mut file = File::create(&stored_path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        return Ok(SavedImage {
            original_name,
            stored_name,
            stored_path,
            kind,
            file_size: bytes.len() as u64,
        });
    }

    Err(UploadError::NoFile)
}
