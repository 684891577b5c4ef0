//! Gateway to the hosted database-and-storage service.
//!
//! Tables are reached through the REST endpoint (`/rest/v1/<table>`) and
//! files through the storage endpoint (`/storage/v1/object/<bucket>/<key>`).
//! Rows are parsed into gallery records here so nothing downstream trusts
//! the raw payload.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::GalleryBackend;
use crate::config::RemoteConfig;
use crate::model::{normalize_category, GalleryImage, NewImage};
use crate::upload::UploadFile;

pub const IMAGES_TABLE: &str = "portfolio_images";
pub const CATEGORIES_TABLE: &str = "portfolio_categories";
pub const STORAGE_BUCKET: &str = "images";

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Image row as returned by the backend, before validation
#[derive(Debug, Deserialize)]
struct ImageRow {
    id: Option<Value>,
    url: Option<String>,
    title: Option<String>,
    category: Option<String>,
    description: Option<String>,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryRow {
    name: Option<String>,
}

impl ImageRow {
    fn into_image(self) -> Result<GalleryImage> {
        let id = match self.id {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            other => bail!("row has no usable id: {:?}", other),
        };
        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow!("row {} has no url", id))?;

        Ok(GalleryImage {
            id,
            url,
            title: self.title.unwrap_or_default(),
            category: normalize_category(&self.category.unwrap_or_default()),
            description: self.description.filter(|d| !d.is_empty()),
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
        })
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Parse a list of image rows, dropping the malformed ones.
fn parse_image_rows(rows: Vec<ImageRow>) -> Vec<GalleryImage> {
    rows.into_iter()
        .filter_map(|row| match row.into_image() {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed image row");
                None
            }
        })
        .collect()
}

fn parse_category_rows(rows: Vec<CategoryRow>) -> Vec<String> {
    let mut names: Vec<String> = rows
        .into_iter()
        .filter_map(|row| row.name)
        .map(|name| normalize_category(&name))
        .filter(|name| !name.is_empty())
        .collect();
    names.sort();
    names.dedup();
    names
}

fn request_error(err: ureq::Error) -> anyhow::Error {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            let mut preview: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            if body.chars().count() > MAX_ERROR_BODY_CHARS {
                preview.push_str("...");
            }
            anyhow!("HTTP {}: {}", code, preview)
        }
        ureq::Error::Transport(transport) => anyhow!("Request failed: {}", transport),
    }
}

pub struct RemoteGateway {
    agent: ureq::Agent,
    base_url: String,
    anon_key: String,
}

impl RemoteGateway {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            bail!("Remote backend URL not configured");
        }
        if config.anon_key.trim().is_empty() {
            tracing::warn!("Remote backend anon key is empty; requests will likely be rejected");
        }
        Ok(Self::new(
            &config.url,
            &config.anon_key,
            Duration::from_secs(config.timeout_secs.max(1)),
        ))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, STORAGE_BUCKET, key)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, STORAGE_BUCKET, key
        )
    }

    fn authorized(&self, request: ureq::Request) -> ureq::Request {
        request
            .set("apikey", &self.anon_key)
            .set("Authorization", &format!("Bearer {}", self.anon_key))
    }
}

impl GalleryBackend for RemoteGateway {
    fn list_images(&self) -> Result<Vec<GalleryImage>> {
        let rows: Vec<ImageRow> = self
            .authorized(self.agent.get(&self.table_url(IMAGES_TABLE)))
            .query("select", "*")
            .query("order", "created_at.desc")
            .call()
            .map_err(request_error)?
            .into_json()
            .context("Failed to parse image rows")?;
        Ok(parse_image_rows(rows))
    }

    fn list_categories(&self) -> Result<Vec<String>> {
        let rows: Vec<CategoryRow> = self
            .authorized(self.agent.get(&self.table_url(CATEGORIES_TABLE)))
            .query("select", "name")
            .query("order", "name.asc")
            .call()
            .map_err(request_error)?
            .into_json()
            .context("Failed to parse category rows")?;
        Ok(parse_category_rows(rows))
    }

    fn insert_image(&self, image: &NewImage) -> Result<GalleryImage> {
        let rows: Vec<ImageRow> = self
            .authorized(self.agent.post(&self.table_url(IMAGES_TABLE)))
            .set("Content-Type", "application/json")
            .set("Prefer", "return=representation")
            .send_json(serde_json::json!([image]))
            .map_err(request_error)?
            .into_json()
            .context("Failed to parse inserted image row")?;

        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Insert returned no row"))?
            .into_image()
            .context("Inserted image row is malformed")
    }

    fn delete_image(&self, id: &str) -> Result<()> {
        self.authorized(self.agent.delete(&self.table_url(IMAGES_TABLE)))
            .query("id", &format!("eq.{}", id))
            .call()
            .map_err(request_error)?;
        Ok(())
    }

    fn insert_category(&self, name: &str) -> Result<()> {
        self.authorized(self.agent.post(&self.table_url(CATEGORIES_TABLE)))
            .set("Content-Type", "application/json")
            .set("Prefer", "return=minimal")
            .send_json(serde_json::json!([{ "name": normalize_category(name) }]))
            .map_err(request_error)?;
        Ok(())
    }

    fn upload_file(&self, file: &UploadFile, key: &str) -> Result<String> {
        tracing::info!(
            key = %key,
            size = file.size(),
            mime_type = %file.mime_type,
            "Uploading file"
        );

        self.authorized(self.agent.post(&self.object_url(key)))
            .set("Content-Type", &file.mime_type)
            .set("x-upsert", "false")
            .send_bytes(&file.bytes)
            .map_err(request_error)?;

        let url = self.public_url(key);
        tracing::info!(url = %url, "Upload successful");
        Ok(url)
    }

    fn supports_upload(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }
}
