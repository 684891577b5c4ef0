//! Storage adapters behind a single gallery contract.
//!
//! The store talks to one [`GalleryBackend`] picked at construction time:
//! a SQLite-backed local store for offline use, or the remote gateway
//! for the hosted database and storage service.

pub mod local;
pub mod remote;

use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::config::{BackendType, Config};
use crate::model::{GalleryImage, NewImage};
use crate::upload::UploadFile;

pub use local::LocalStore;
pub use remote::RemoteGateway;

/// Trait for gallery storage implementations.
///
/// Implementations are stateless beyond their durable medium; the
/// in-memory view lives in the store.
pub trait GalleryBackend: Send + Sync {
    /// List images, newest first
    fn list_images(&self) -> Result<Vec<GalleryImage>>;

    /// List category names, alphabetically
    fn list_categories(&self) -> Result<Vec<String>>;

    /// Persist a new image and return the stored record with its id
    fn insert_image(&self, image: &NewImage) -> Result<GalleryImage>;

    /// Delete by id. Deleting an unknown id succeeds.
    fn delete_image(&self, id: &str) -> Result<()>;

    /// Persist a new category name
    fn insert_category(&self, name: &str) -> Result<()>;

    /// Store a file and return its public URL
    fn upload_file(&self, file: &UploadFile, key: &str) -> Result<String> {
        let _ = (file, key);
        Err(anyhow!("File upload not supported by the {} backend", self.backend_name()))
    }

    /// Whether `upload_file` is available
    fn supports_upload(&self) -> bool {
        false
    }

    /// Backend name for logs and messages
    fn backend_name(&self) -> &'static str;
}

/// Create the adapter selected in the configuration.
pub fn open_backend(config: &Config) -> Result<Arc<dyn GalleryBackend>> {
    match config.backend {
        BackendType::Local => {
            let store = LocalStore::open(&config.local.db_path)?;
            Ok(Arc::new(store))
        }
        BackendType::Remote => {
            let gateway = RemoteGateway::from_config(&config.remote)?;
            Ok(Arc::new(gateway))
        }
    }
}
