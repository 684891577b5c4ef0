//! Gallery record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A published gallery image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub id: String,
    pub url: String,
    pub title: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A fully resolved record ready to be persisted (no id yet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewImage {
    pub url: String,
    pub title: String,
    pub category: String,
    pub description: Option<String>,
}

/// User input for adding an image. Only `url` and `category` are required.
#[derive(Debug, Clone, Default)]
pub struct ImageInput {
    pub url: String,
    pub category: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Original file name, used to derive a default title
    pub source_name: Option<String>,
    /// Zero-based position within a batch, used in the default description
    pub batch_index: usize,
}

impl ImageInput {
    pub fn new(url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn with_batch_index(mut self, index: usize) -> Self {
        self.batch_index = index;
        self
    }

    /// Resolve defaults and normalize the category.
    pub fn resolve(&self) -> Result<NewImage, MissingField> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(MissingField::Url);
        }
        let category = normalize_category(&self.category);
        if category.is_empty() {
            return Err(MissingField::Category);
        }

        let title = non_blank(self.title.as_deref())
            .map(str::to_string)
            .or_else(|| self.source_name.as_deref().and_then(title_from_file_name))
            .unwrap_or_else(|| "Untitled".to_string());

        let description = non_blank(self.description.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| default_description(self.batch_index, &category));

        Ok(NewImage {
            url: url.to_string(),
            title,
            category,
            description: Some(description),
        })
    }
}

/// Which required field an [`ImageInput`] is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    Url,
    Category,
}

/// Lower-case, trimmed category name.
pub fn normalize_category(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Title derived from a file name: everything before the first dot.
pub fn title_from_file_name(name: &str) -> Option<String> {
    let file_name = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())?;
    let stem = file_name.split('.').next().unwrap_or_default().trim();
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

pub fn default_description(batch_index: usize, category: &str) -> String {
    format!("Image {} from {} category", batch_index + 1, category)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
