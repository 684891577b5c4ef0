//! Error types surfaced at the gallery store boundary.

use thiserror::Error;

/// Result type alias for gallery store operations.
pub type Result<T> = std::result::Result<T, GalleryError>;

/// Input rejected before any storage call was made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Image URL is required")]
    MissingUrl,

    #[error("Category is required")]
    MissingCategory,

    #[error("Please select at least one file")]
    NoFiles,

    #[error("Invalid file")]
    EmptyFile,

    #[error("File size too large (max 10MB)")]
    FileTooLarge { size: u64 },

    #[error("Invalid file type. Only JPEG, PNG, GIF, and WebP are allowed.")]
    UnsupportedType { mime_type: String },
}

/// Errors reported by the gallery store.
///
/// Each variant maps to one failure class; the message is what the user sees
/// in the error notification.
#[derive(Debug, Clone, Error)]
pub enum GalleryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Listing a collection failed
    #[error("{message}: {source_message}")]
    Retrieval {
        message: String,
        source_message: String,
    },

    /// Insert or delete failed
    #[error("{message}: {source_message}")]
    Mutation {
        message: String,
        source_message: String,
    },

    /// Storage put failed
    #[error("{message}: {source_message}")]
    Upload {
        message: String,
        source_message: String,
    },

    /// Change feed setup or teardown failed
    #[error("Realtime subscription error: {0}")]
    Subscription(String),
}

impl GalleryError {
    pub fn retrieval(message: impl Into<String>, source: &anyhow::Error) -> Self {
        Self::Retrieval {
            message: message.into(),
            source_message: format!("{:#}", source),
        }
    }

    pub fn mutation(message: impl Into<String>, source: &anyhow::Error) -> Self {
        Self::Mutation {
            message: message.into(),
            source_message: format!("{:#}", source),
        }
    }

    pub fn upload(message: impl Into<String>, source: &anyhow::Error) -> Self {
        Self::Upload {
            message: message.into(),
            source_message: format!("{:#}", source),
        }
    }

    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Subscription(message.into())
    }

    /// Short user-facing summary, without the underlying cause.
    pub fn summary(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Retrieval { message, .. }
            | Self::Mutation { message, .. }
            | Self::Upload { message, .. } => message.clone(),
            Self::Subscription(message) => message.clone(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_and_type_messages_differ() {
        let size = ValidationError::FileTooLarge { size: 11 * 1024 * 1024 };
        let kind = ValidationError::UnsupportedType {
            mime_type: "text/plain".to_string(),
        };
        assert_ne!(size.to_string(), kind.to_string());
    }

    #[test]
    fn test_summary_drops_cause() {
        let err = GalleryError::retrieval(
            "Failed to load images from database",
            &anyhow::anyhow!("connection refused"),
        );
        assert_eq!(err.summary(), "Failed to load images from database");
        assert!(err.to_string().contains("connection refused"));
    }
}
