use crate::config::UploadConfig;
use axum::{
    extract::{multipart::MultipartError, Multipart},
    http::StatusCode,
};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

pub const UPLOAD_URL_PREFIX: &str = "/static/uploads";
const FILE_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("Empty filename")]
    EmptyFilename,
    #[error("Invalid file type. Only JPG/PNG/JPEG allowed")]
    InvalidType,
    #[error("File too large (max {})", size_label(.limit))]
    TooLarge { limit: usize },
    #[error("Malformed upload: {0}")]
    Multipart(String),
    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

fn size_label(bytes: &usize) -> String {
    const MB: usize = 1024 * 1024;
    const KB: usize = 1024;
    match *bytes {
        b if b >= MB && b % MB == 0 => format!("{}MB", b / MB),
        b if b >= KB && b % KB == 0 => format!("{}KB", b / KB),
        b => format!("{} bytes", b),
    }
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::MissingFile
            | UploadError::EmptyFilename
            | UploadError::InvalidType
            | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedUpload {
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
    allowed_extensions: Vec<String>,
}

impl UploadStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            max_bytes: config.max_bytes,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Checks the client supplied name and returns a safe version of it.
    pub fn check_file_name(&self, file_name: &str) -> Result<String, UploadError> {
        if file_name.trim().is_empty() {
            return Err(UploadError::EmptyFilename);
        }

        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .ok_or(UploadError::InvalidType)?;
        if !self.allowed_extensions.contains(&extension) {
            return Err(UploadError::InvalidType);
        }

        let sanitized = sanitize_file_name(file_name);
        if sanitized.is_empty() || !sanitized.contains('.') {
            return Ok(format!("upload.{}", extension));
        }
        Ok(sanitized)
    }

    fn multipart_error(&self, err: MultipartError) -> UploadError {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::TooLarge {
                limit: self.max_bytes,
            }
        } else {
            UploadError::Multipart(err.body_text())
        }
    }

    pub async fn save(&self, mut multipart: Multipart) -> Result<SavedUpload, UploadError> {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| self.multipart_error(e))?
        {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }

            let file_name = self.check_file_name(field.file_name().unwrap_or_default())?;
            let data = field.bytes().await.map_err(|e| self.multipart_error(e))?;
            if data.len() > self.max_bytes {
                return Err(UploadError::TooLarge {
                    limit: self.max_bytes,
                });
            }

            let stored_name = format!("{}_{}", Uuid::new_v4().simple(), file_name);
            let path = self.dir.join(&stored_name);
            tokio::fs::write(&path, &data).await?;
            tracing::debug!("Stored {} bytes at {:?}", data.len(), path);

            return Ok(SavedUpload {
                path,
                url: format!("{}/{}", UPLOAD_URL_PREFIX, stored_name),
            });
        }

        Err(UploadError::MissingFile)
    }
}

/// Keeps the final path component, ASCII alphanumerics, `.`, `-` and `_`.
fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    cleaned.trim_start_matches(['.', '_']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UploadStore {
        UploadStore::new(&UploadConfig::default())
    }

    #[test]
    fn test_allowed_extensions() {
        let store = store();
        assert_eq!(store.check_file_name("leaf.JPG").unwrap(), "leaf.JPG");
        assert_eq!(store.check_file_name("leaf.jpeg").unwrap(), "leaf.jpeg");
        assert_eq!(store.check_file_name("leaf.png").unwrap(), "leaf.png");
        assert!(matches!(
            store.check_file_name("leaf.gif"),
            Err(UploadError::InvalidType)
        ));
        assert!(matches!(
            store.check_file_name("leaf"),
            Err(UploadError::InvalidType)
        ));
        assert!(matches!(
            store.check_file_name("  "),
            Err(UploadError::EmptyFilename)
        ));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd.png"), "passwd.png");
        assert_eq!(sanitize_file_name("C:\\photos\\my leaf.jpg"), "my_leaf.jpg");
        assert_eq!(sanitize_file_name(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_file_name("feuille_été.png"), "feuille_t.png");
    }

    #[test]
    fn test_unsafe_name_falls_back() {
        assert_eq!(store().check_file_name("../.png").unwrap(), "upload.png");
        assert_eq!(store().check_file_name("ééé.png").unwrap(), "upload.png");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(UploadError::MissingFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            UploadError::TooLarge { limit: 16 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_too_large_message() {
        let limit = UploadConfig::default().max_bytes;
        assert_eq!(
            UploadError::TooLarge { limit }.to_string(),
            "File too large (max 5MB)"
        );
        assert_eq!(
            UploadError::TooLarge { limit: 64 * 1024 }.to_string(),
            "File too large (max 64KB)"
        );
        assert_eq!(
            UploadError::TooLarge { limit: 16 }.to_string(),
            "File too large (max 16 bytes)"
        );
    }
}
