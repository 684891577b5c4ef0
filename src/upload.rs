//! Upload constraints and storage key generation.

use anyhow::{Context, Result};
use rand::Rng;
use std::path::Path;

use crate::error::ValidationError;

/// Maximum accepted upload size
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// MIME types accepted for upload
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Prefix for uploaded objects inside the storage bucket
pub const STORAGE_PREFIX: &str = "portfolio";

/// A file selected for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let mime_type = mime_from_name(&name);
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Extension of the original name, falling back to one implied by the MIME type.
    pub fn extension(&self) -> String {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| extension_from_mime(&self.mime_type))
    }
}

/// Check every constraint before any network call.
pub fn validate_upload(file: &UploadFile) -> std::result::Result<(), ValidationError> {
    if file.bytes.is_empty() {
        return Err(ValidationError::EmptyFile);
    }
    if file.size() > MAX_UPLOAD_BYTES {
        return Err(ValidationError::FileTooLarge { size: file.size() });
    }
    let mime_type = file.mime_type.to_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(ValidationError::UnsupportedType {
            mime_type: file.mime_type.clone(),
        });
    }
    Ok(())
}

/// Collision-resistant object key: `portfolio/{millis}-{suffix}.{ext}`.
pub fn storage_key(file: &UploadFile) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    format!(
        "{}/{}-{}.{}",
        STORAGE_PREFIX,
        millis,
        random_suffix(11),
        file.extension()
    )
}

fn random_suffix(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// MIME type implied by a file name's extension.
pub fn mime_from_name(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn extension_from_mime(mime_type: &str) -> String {
    let mime_type = match mime_type.to_lowercase().as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        other => other.to_string(),
    };
    let extensions = mime_guess::get_mime_extensions_str(&mime_type).unwrap_or_default();
    extensions
        .iter()
        .find(|ext| mime_guess::from_ext(ext).first_raw() == Some(mime_type.as_str()))
        .or_else(|| extensions.first())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_of(size: usize, mime: &str) -> UploadFile {
        UploadFile::new("photo.jpg", mime, vec![0u8; size])
    }

    #[test]
    fn test_accepts_allowed_types() {
        for mime in ALLOWED_MIME_TYPES {
            assert!(validate_upload(&file_of(16, mime)).is_ok(), "{}", mime);
        }
        assert!(validate_upload(&file_of(16, "IMAGE/PNG")).is_ok());
    }

    #[test]
    fn test_rejects_empty_file() {
        assert_eq!(validate_upload(&file_of(0, "image/png")), Err(ValidationError::EmptyFile));
    }

    #[test]
    fn test_rejects_oversized_file() {
        let err = validate_upload(&file_of(11 * 1024 * 1024, "image/png")).unwrap_err();
        assert!(matches!(err, ValidationError::FileTooLarge { .. }));

        assert!(validate_upload(&file_of(MAX_UPLOAD_BYTES as usize, "image/png")).is_ok());
    }

    #[test]
    fn test_rejects_unsupported_type() {
        let err = validate_upload(&file_of(16, "text/plain")).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedType { .. }));
    }

    #[test]
    fn test_size_checked_before_type() {
        let err = validate_upload(&file_of(11 * 1024 * 1024, "text/plain")).unwrap_err();
        assert!(matches!(err, ValidationError::FileTooLarge { .. }));
    }

    #[test]
    fn test_storage_key_shape() {
        let file = UploadFile::new("Hero Shot.PNG", "image/png", vec![1]);
        let key = storage_key(&file);

        assert!(key.starts_with("portfolio/"));
        assert!(key.ends_with(".png"));
        assert_ne!(key, storage_key(&file));
    }

    #[test]
    fn test_extension_falls_back_to_mime() {
        let file = UploadFile::new("clipboard", "image/webp", vec![1]);
        assert_eq!(file.extension(), "webp");
    }

    #[test]
    fn test_extension_fallback_for_jpeg_aliases() {
        for mime in ["image/jpeg", "image/jpg"] {
            let ext = UploadFile::new("paste", mime, vec![1]).extension();
            assert_eq!(mime_from_name(&format!("x.{}", ext)), "image/jpeg", "{}", mime);
        }
        assert_eq!(UploadFile::new("blob", "application/x-unknown", vec![1]).extension(), "bin");
    }

    #[test]
    fn test_mime_from_name() {
        assert_eq!(mime_from_name("a.JPG"), "image/jpeg");
        assert_eq!(mime_from_name("scan.jpe"), "image/jpeg");
        assert_eq!(mime_from_name("b.webp"), "image/webp");
        assert_eq!(mime_from_name("notes.txt"), "text/plain");
        assert_eq!(mime_from_name("archive"), "application/octet-stream");
    }

    #[test]
    fn test_from_path_guesses_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Cover.GIF");
        std::fs::write(&path, b"GIF89a").unwrap();

        let file = UploadFile::from_path(&path).unwrap();

        assert_eq!(file.name, "Cover.GIF");
        assert_eq!(file.mime_type, "image/gif");
        assert!(validate_upload(&file).is_ok());
    }
}
