//! In-memory gallery state.
//!
//! The store owns the image list and the category set. It merges the
//! initial load, its own mutations and realtime change events into one
//! view. Every failure is returned to the caller, recorded as the last
//! error and queued as an error notification.

use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::GalleryBackend;
use crate::config::RealtimeConfig;
use crate::error::{GalleryError, Result, ValidationError};
use crate::model::{normalize_category, GalleryImage, ImageInput, MissingField};
use crate::notification::Notification;
use crate::realtime::{ChangeEvent, RealtimeListener};
use crate::upload::{storage_key, validate_upload, UploadFile};

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Open the change feed after `initialize`
    pub realtime: bool,
    pub poll_interval: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

impl From<&RealtimeConfig> for StoreOptions {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            realtime: config.enabled,
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
        }
    }
}

/// Outcome of loading both collections. Each side fails independently.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub images: Option<GalleryError>,
    pub categories: Option<GalleryError>,
    pub subscription: Option<GalleryError>,
}

impl LoadReport {
    pub fn is_ok(&self) -> bool {
        self.images.is_none() && self.categories.is_none() && self.subscription.is_none()
    }
}

/// Shared fields for a batch of uploaded files
#[derive(Debug, Clone, Default)]
pub struct ImageTemplate {
    pub category: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default)]
pub struct PublishReport {
    pub added: Vec<GalleryImage>,
    /// File name and the error that stopped it
    pub failed: Vec<(String, GalleryError)>,
}

pub struct GalleryStore {
    backend: Arc<dyn GalleryBackend>,
    options: StoreOptions,
    images: Vec<GalleryImage>,
    categories: Vec<String>,
    loading: bool,
    last_error: Option<GalleryError>,
    notifications: Vec<Notification>,
    listener: Option<RealtimeListener>,
}

impl GalleryStore {
    /// Create an empty store. Nothing is loaded until [`initialize`](Self::initialize).
    pub fn new(backend: Arc<dyn GalleryBackend>, options: StoreOptions) -> Self {
        Self {
            backend,
            options,
            images: Vec::new(),
            categories: Vec::new(),
            loading: true,
            last_error: None,
            notifications: Vec::new(),
            listener: None,
        }
    }

    // ========================================================================
    // Read values
    // ========================================================================

    pub fn images(&self) -> &[GalleryImage] {
        &self.images
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&GalleryError> {
        self.last_error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn find_image(&self, id: &str) -> Option<&GalleryImage> {
        self.images.iter().find(|image| image.id == id)
    }

    /// Hand pending notifications to the presentation layer.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub fn is_realtime_active(&self) -> bool {
        self.listener.as_ref().is_some_and(|l| l.is_running())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load both collections, then open the change feed if enabled.
    pub fn initialize(&mut self) -> LoadReport {
        let mut report = self.refetch();

        if self.options.realtime {
            if let Err(e) = self.start_realtime() {
                tracing::warn!(error = %e, "Realtime unavailable, continuing without it");
                report.subscription = Some(e);
            }
        }

        report
    }

    /// Reload both collections without touching the change feed.
    pub fn refetch(&mut self) -> LoadReport {
        self.loading = true;

        let backend = &self.backend;
        let (images, categories) = std::thread::scope(|s| {
            let images = s.spawn(|| backend.list_images());
            let categories = s.spawn(|| backend.list_categories());
            (
                images
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("image fetch panicked"))),
                categories
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("category fetch panicked"))),
            )
        });

        let mut report = LoadReport::default();

        match images {
            Ok(images) => {
                tracing::debug!(count = images.len(), "Images loaded");
                self.images = dedup_by_id(images);
            }
            Err(e) => {
                report.images = Some(self.fail(GalleryError::retrieval(
                    "Failed to load images from database",
                    &e,
                )));
            }
        }

        match categories {
            Ok(categories) => self.set_categories(categories),
            Err(e) => {
                report.categories = Some(self.fail(GalleryError::retrieval(
                    "Failed to load categories from database",
                    &e,
                )));
            }
        }

        self.loading = false;
        report
    }

    /// Subscribe to changes from the current snapshot. No-op if already running.
    pub fn start_realtime(&mut self) -> Result<()> {
        if self.is_realtime_active() {
            return Ok(());
        }
        let listener = RealtimeListener::start(
            self.backend.clone(),
            &self.images,
            &self.categories,
            self.options.poll_interval,
        )?;
        self.listener = Some(listener);
        Ok(())
    }

    /// Stop the change feed. The store stays usable without it.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.listener.take() {
            Some(mut listener) => listener.stop().inspect_err(|e| {
                tracing::warn!(error = %e, "Realtime teardown failed");
            }),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Realtime merge
    // ========================================================================

    /// Apply every event the listener has delivered so far.
    pub fn poll_realtime(&mut self) -> usize {
        let events = match &self.listener {
            Some(listener) => listener.drain(),
            None => return 0,
        };
        let count = events.len();
        for event in events {
            self.apply_event(event);
        }
        count
    }

    /// Merge one change event. Every kind is idempotent.
    pub fn apply_event(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::ImageInserted(image) => self.upsert_front(image),
            ChangeEvent::ImageUpdated(image) => {
                if let Some(existing) = self.images.iter_mut().find(|i| i.id == image.id) {
                    *existing = image;
                }
            }
            ChangeEvent::ImageDeleted { id } => self.images.retain(|i| i.id != id),
            ChangeEvent::CategoriesChanged => self.refetch_categories(),
        }
    }

    fn refetch_categories(&mut self) {
        match self.backend.list_categories() {
            Ok(categories) => self.set_categories(categories),
            Err(e) => {
                self.fail(GalleryError::retrieval(
                    "Failed to load categories from database",
                    &e,
                ));
            }
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Persist a new image and put it at the front of the list.
    ///
    /// A category that is not known yet is registered right after the image
    /// is stored. If that fails the stored image is deleted again and the
    /// category error is returned, so a failed add changes nothing.
    pub fn add_image(&mut self, input: ImageInput) -> Result<GalleryImage> {
        let new_image = match input.resolve() {
            Ok(image) => image,
            Err(MissingField::Url) => return Err(self.fail(ValidationError::MissingUrl.into())),
            Err(MissingField::Category) => {
                return Err(self.fail(ValidationError::MissingCategory.into()))
            }
        };

        let image = self.backend.insert_image(&new_image).map_err(|e| {
            self.fail(GalleryError::mutation("Failed to add image to database", &e))
        })?;

        let new_category = match self.categories.binary_search(&new_image.category) {
            Ok(_) => None,
            Err(pos) => Some(pos),
        };

        if let Some(pos) = new_category {
            if let Err(e) = self.backend.insert_category(&new_image.category) {
                if let Err(undo) = self.backend.delete_image(&image.id) {
                    tracing::warn!(
                        id = %image.id,
                        error = %undo,
                        "Failed to roll back image after category error"
                    );
                }
                return Err(self.fail(GalleryError::mutation(
                    "Failed to add category to database",
                    &e,
                )));
            }
            tracing::info!(category = %new_image.category, "Category added");
            self.categories.insert(pos, new_image.category.clone());
        }

        tracing::info!(id = %image.id, category = %new_image.category, "Image added");
        self.upsert_front(image.clone());
        self.notify(Notification::success("Image added successfully"));
        Ok(image)
    }

    /// Delete by id, from durable storage first and then from memory.
    ///
    /// An id the store has not loaded is still forwarded to the backend,
    /// whose delete is idempotent, so a partial load cannot hide a row.
    pub fn remove_image(&mut self, id: &str) -> Result<()> {
        let known = self.find_image(id).is_some();

        self.backend.delete_image(id).map_err(|e| {
            self.fail(GalleryError::mutation("Failed to remove image from database", &e))
        })?;

        if !known {
            tracing::debug!(id = %id, "Removed image that was not loaded");
            return Ok(());
        }

        self.images.retain(|image| image.id != id);
        tracing::info!(id = %id, "Image removed");
        self.notify(Notification::success("Image removed successfully"));
        Ok(())
    }

    /// Register a category. Returns false if it already existed.
    pub fn add_category(&mut self, name: &str) -> Result<bool> {
        let name = normalize_category(name);
        if name.is_empty() {
            return Err(self.fail(ValidationError::MissingCategory.into()));
        }

        let pos = match self.categories.binary_search(&name) {
            Ok(_) => return Ok(false),
            Err(pos) => pos,
        };

        self.backend.insert_category(&name).map_err(|e| {
            self.fail(GalleryError::mutation("Failed to add category to database", &e))
        })?;

        tracing::info!(category = %name, "Category added");
        self.categories.insert(pos, name);
        self.notify(Notification::success("Category added successfully"));
        Ok(true)
    }

    /// Validate and store a file, returning its public URL.
    ///
    /// The caller still has to add an image for it; an upload whose image
    /// is never added stays in storage.
    pub fn upload_file(&mut self, file: &UploadFile) -> Result<String> {
        if let Err(e) = validate_upload(file) {
            return Err(self.fail(e.into()));
        }

        if !self.backend.supports_upload() {
            let e = anyhow!(
                "File upload not supported by the {} backend",
                self.backend.backend_name()
            );
            return Err(self.fail(GalleryError::upload("Failed to upload image file", &e)));
        }

        let key = storage_key(file);
        self.backend
            .upload_file(file, &key)
            .map_err(|e| self.fail(GalleryError::upload("Failed to upload image file", &e)))
    }

    /// Upload each file and add an image for it with the shared template.
    ///
    /// One file failing does not stop the others.
    pub fn publish_files(
        &mut self,
        files: &[UploadFile],
        template: &ImageTemplate,
    ) -> Result<PublishReport> {
        if files.is_empty() {
            return Err(self.fail(ValidationError::NoFiles.into()));
        }
        if normalize_category(&template.category).is_empty() {
            return Err(self.fail(ValidationError::MissingCategory.into()));
        }

        let mut report = PublishReport::default();

        for (index, file) in files.iter().enumerate() {
            let url = match self.upload_file(file) {
                Ok(url) => url,
                Err(e) => {
                    report.failed.push((file.name.clone(), e));
                    continue;
                }
            };

            let mut input = ImageInput::new(url, template.category.as_str())
                .with_source_name(file.name.as_str())
                .with_batch_index(index);
            input.title = template.title.clone();
            input.description = template.description.clone();

            match self.add_image(input) {
                Ok(image) => report.added.push(image),
                Err(e) => report.failed.push((file.name.clone(), e)),
            }
        }

        if !report.added.is_empty() {
            self.notify(Notification::success(format!(
                "{} image(s) added to your portfolio.",
                report.added.len()
            )));
        }

        Ok(report)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Replace the record with the same id, or prepend it.
    fn upsert_front(&mut self, image: GalleryImage) {
        match self.images.iter_mut().find(|i| i.id == image.id) {
            Some(existing) => *existing = image,
            None => self.images.insert(0, image),
        }
    }

    fn set_categories(&mut self, mut categories: Vec<String>) {
        categories.sort();
        categories.dedup();
        self.categories = categories;
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    /// Record a failure and hand it back for returning.
    fn fail(&mut self, error: GalleryError) -> GalleryError {
        if error.is_validation() {
            tracing::debug!(error = %error, "Rejected input");
        } else {
            tracing::error!(error = %error, "Gallery operation failed");
        }
        self.notify(Notification::error(error.summary()));
        self.last_error = Some(error.clone());
        error
    }
}

fn dedup_by_id(images: Vec<GalleryImage>) -> Vec<GalleryImage> {
    let mut seen = std::collections::HashSet::new();
    images
        .into_iter()
        .filter(|image| seen.insert(image.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalStore;
    use crate::model::NewImage;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    /// Local store with switchable failures and an upload counter.
    #[derive(Default)]
    struct ScriptedBackend {
        inner: Option<LocalStore>,
        fail_images: AtomicBool,
        fail_categories: AtomicBool,
        fail_insert: AtomicBool,
        fail_category_insert: AtomicBool,
        fail_delete: AtomicBool,
        no_upload: AtomicBool,
        uploads: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                inner: Some(LocalStore::open_in_memory().unwrap()),
                ..Default::default()
            }
        }

        fn inner(&self) -> &LocalStore {
            self.inner.as_ref().unwrap()
        }
    }

    impl GalleryBackend for ScriptedBackend {
        fn list_images(&self) -> anyhow::Result<Vec<GalleryImage>> {
            if self.fail_images.load(Ordering::SeqCst) {
                return Err(anyhow!("images offline"));
            }
            self.inner().list_images()
        }

        fn list_categories(&self) -> anyhow::Result<Vec<String>> {
            if self.fail_categories.load(Ordering::SeqCst) {
                return Err(anyhow!("categories offline"));
            }
            self.inner().list_categories()
        }

        fn insert_image(&self, image: &NewImage) -> anyhow::Result<GalleryImage> {
            if self.fail_insert.load(Ordering::SeqCst) {
                return Err(anyhow!("insert rejected"));
            }
            self.inner().insert_image(image)
        }

        fn delete_image(&self, id: &str) -> anyhow::Result<()> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(anyhow!("delete rejected"));
            }
            self.inner().delete_image(id)
        }

        fn insert_category(&self, name: &str) -> anyhow::Result<()> {
            if self.fail_category_insert.load(Ordering::SeqCst) {
                return Err(anyhow!("category insert rejected"));
            }
            self.inner().insert_category(name)
        }

        fn upload_file(&self, _file: &UploadFile, key: &str) -> anyhow::Result<String> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://cdn.test/{}", key))
        }

        fn supports_upload(&self) -> bool {
            !self.no_upload.load(Ordering::SeqCst)
        }

        fn backend_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn quiet() -> StoreOptions {
        StoreOptions {
            realtime: false,
            poll_interval: Duration::from_millis(10),
        }
    }

    fn local_store() -> GalleryStore {
        let mut store = GalleryStore::new(Arc::new(LocalStore::open_in_memory().unwrap()), quiet());
        assert!(store.initialize().is_ok());
        store
    }

    fn scripted_store() -> (Arc<ScriptedBackend>, GalleryStore) {
        let backend = Arc::new(ScriptedBackend::new());
        let mut store = GalleryStore::new(backend.clone(), quiet());
        assert!(store.initialize().is_ok());
        (backend, store)
    }

    fn remote_image(id: &str, category: &str) -> GalleryImage {
        GalleryImage {
            id: id.to_string(),
            url: format!("https://cdn.test/{}.png", id),
            title: id.to_uppercase(),
            category: category.to_string(),
            description: None,
            created_at: None,
        }
    }

    #[test]
    fn test_loading_until_initialized() {
        let mut store =
            GalleryStore::new(Arc::new(LocalStore::open_in_memory().unwrap()), quiet());
        assert!(store.is_loading());
        store.initialize();
        assert!(!store.is_loading());
    }

    #[test]
    fn test_logo_design_scenario() {
        let mut store = local_store();
        assert!(store.images().is_empty());
        assert!(store.categories().is_empty());

        assert!(store.add_category("logo-design").unwrap());
        assert!(store.images().is_empty());
        assert_eq!(store.categories(), ["logo-design".to_string()]);

        let image = store
            .add_image(ImageInput::new("u1", "Logo-Design").with_title("X"))
            .unwrap();

        assert_eq!(image.category, "logo-design");
        assert_eq!(image.title, "X");
        assert_eq!(store.images(), [image]);
        assert_eq!(store.categories(), ["logo-design".to_string()]);
    }

    #[test]
    fn test_add_then_remove_restores_images() {
        let mut store = local_store();
        store.add_image(ImageInput::new("u0", "branding")).unwrap();
        let before = store.images().to_vec();

        let added = store.add_image(ImageInput::new("u1", "digital-art")).unwrap();
        assert_eq!(store.images()[0], added);

        store.remove_image(&added.id).unwrap();
        assert_eq!(store.images(), before.as_slice());
        assert!(store.categories().contains(&"digital-art".to_string()));
    }

    #[test]
    fn test_add_category_is_case_insensitive() {
        let mut store = local_store();
        assert!(store.add_category("Branding").unwrap());
        assert!(!store.add_category("branding").unwrap());
        assert_eq!(store.categories(), ["branding".to_string()]);
    }

    #[test]
    fn test_categories_stay_sorted() {
        let mut store = local_store();
        for name in ["web", "branding", "logo-design", "art"] {
            store.add_category(name).unwrap();
        }
        assert_eq!(store.categories(), ["art", "branding", "logo-design", "web"]);
    }

    #[test]
    fn test_add_image_registers_new_category() {
        let (backend, mut store) = scripted_store();
        store.add_image(ImageInput::new("u1", " Photography ")).unwrap();

        assert_eq!(store.categories(), ["photography".to_string()]);
        assert_eq!(
            backend.list_categories().unwrap(),
            vec!["photography".to_string()]
        );
    }

    #[test]
    fn test_add_image_validation() {
        let (_, mut store) = scripted_store();

        let err = store.add_image(ImageInput::new("", "branding")).unwrap_err();
        assert!(matches!(err, GalleryError::Validation(ValidationError::MissingUrl)));

        let err = store.add_image(ImageInput::new("u1", "  ")).unwrap_err();
        assert!(matches!(err, GalleryError::Validation(ValidationError::MissingCategory)));

        assert!(store.images().is_empty());
        assert!(store.last_error().is_some());
    }

    #[test]
    fn test_failed_insert_changes_nothing() {
        let (backend, mut store) = scripted_store();
        backend.fail_insert.store(true, Ordering::SeqCst);

        let err = store.add_image(ImageInput::new("u1", "new-category")).unwrap_err();

        assert!(matches!(err, GalleryError::Mutation { .. }));
        assert!(store.images().is_empty());
        assert!(store.categories().is_empty());
        assert!(backend.list_categories().unwrap().is_empty());

        let notes = store.take_notifications();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].is_error());
        assert_eq!(notes[0].message, "Failed to add image to database");
    }

    #[test]
    fn test_category_failure_rolls_back_image() {
        let (backend, mut store) = scripted_store();
        backend.fail_category_insert.store(true, Ordering::SeqCst);

        let err = store.add_image(ImageInput::new("u1", "brand-new")).unwrap_err();

        assert!(matches!(err, GalleryError::Mutation { .. }));
        assert!(err.to_string().contains("category insert rejected"));
        assert!(store.images().is_empty());
        assert!(store.categories().is_empty());
        assert!(backend.list_images().unwrap().is_empty());
        assert!(backend.list_categories().unwrap().is_empty());

        let notes = store.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "Failed to add category to database");
    }

    #[test]
    fn test_known_category_skips_category_insert() {
        let (backend, mut store) = scripted_store();
        store.add_category("branding").unwrap();
        backend.fail_category_insert.store(true, Ordering::SeqCst);

        let image = store.add_image(ImageInput::new("u1", "Branding")).unwrap();

        assert_eq!(store.images(), [image]);
        assert_eq!(store.categories(), ["branding".to_string()]);
    }

    #[test]
    fn test_remove_forwards_unloaded_id_to_backend() {
        let (backend, mut store) = scripted_store();
        let unseen = backend
            .inner()
            .insert_image(&NewImage {
                url: "u1".to_string(),
                title: "t".to_string(),
                category: "branding".to_string(),
                description: None,
            })
            .unwrap();
        assert!(store.find_image(&unseen.id).is_none());

        store.remove_image(&unseen.id).unwrap();

        assert!(backend.list_images().unwrap().is_empty());
        assert!(store.take_notifications().is_empty());
    }

    #[test]
    fn test_failed_remove_keeps_image() {
        let (backend, mut store) = scripted_store();
        let image = store.add_image(ImageInput::new("u1", "branding")).unwrap();
        store.take_notifications();
        backend.fail_delete.store(true, Ordering::SeqCst);

        let err = store.remove_image(&image.id).unwrap_err();

        assert!(matches!(err, GalleryError::Mutation { .. }));
        assert_eq!(store.images(), [image]);
        assert_eq!(
            store.take_notifications()[0].message,
            "Failed to remove image from database"
        );
    }

    #[test]
    fn test_remove_unknown_id_is_silent() {
        let mut store = local_store();
        store.add_image(ImageInput::new("u1", "branding")).unwrap();
        store.take_notifications();
        let images = store.images().to_vec();
        let categories = store.categories().to_vec();

        store.remove_image("does-not-exist").unwrap();

        assert_eq!(store.images(), images.as_slice());
        assert_eq!(store.categories(), categories.as_slice());
        assert!(store.take_notifications().is_empty());
        assert!(store.last_error().is_none());
    }

    #[test]
    fn test_image_fetch_failure_keeps_categories() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.inner().insert_category("branding").unwrap();
        backend.fail_images.store(true, Ordering::SeqCst);

        let mut store = GalleryStore::new(backend, quiet());
        let report = store.initialize();

        assert!(matches!(report.images, Some(GalleryError::Retrieval { .. })));
        assert!(report.categories.is_none());
        assert_eq!(store.categories(), ["branding".to_string()]);
        assert!(!store.is_loading());
    }

    #[test]
    fn test_category_fetch_failure_keeps_images() {
        let backend = Arc::new(ScriptedBackend::new());
        backend
            .inner()
            .insert_image(&NewImage {
                url: "u1".to_string(),
                title: "t".to_string(),
                category: "branding".to_string(),
                description: None,
            })
            .unwrap();
        backend.fail_categories.store(true, Ordering::SeqCst);

        let mut store = GalleryStore::new(backend, quiet());
        let report = store.initialize();

        assert!(report.images.is_none());
        assert!(report.categories.is_some());
        assert_eq!(store.images().len(), 1);
        assert!(store.categories().is_empty());
        assert!(!store.is_loading());

        let messages: Vec<String> = store
            .take_notifications()
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(messages, vec!["Failed to load categories from database".to_string()]);
    }

    #[test]
    fn test_realtime_insert_of_known_image_is_not_duplicated() {
        let mut store = local_store();
        let added = store.add_image(ImageInput::new("u1", "branding")).unwrap();

        store.apply_event(ChangeEvent::ImageInserted(added.clone()));
        store.apply_event(ChangeEvent::ImageInserted(added.clone()));

        assert_eq!(store.images(), [added]);
    }

    #[test]
    fn test_realtime_events_merge() {
        let mut store = local_store();
        store.apply_event(ChangeEvent::ImageInserted(remote_image("a", "branding")));
        store.apply_event(ChangeEvent::ImageInserted(remote_image("b", "branding")));
        assert_eq!(store.images()[0].id, "b");

        let mut renamed = remote_image("a", "branding");
        renamed.title = "Renamed".to_string();
        store.apply_event(ChangeEvent::ImageUpdated(renamed.clone()));
        assert_eq!(store.find_image("a"), Some(&renamed));

        store.apply_event(ChangeEvent::ImageUpdated(remote_image("zzz", "branding")));
        assert!(store.find_image("zzz").is_none());

        store.apply_event(ChangeEvent::ImageDeleted { id: "b".to_string() });
        store.apply_event(ChangeEvent::ImageDeleted { id: "b".to_string() });
        assert_eq!(store.images(), [renamed]);
    }

    #[test]
    fn test_categories_event_refetches() {
        let (backend, mut store) = scripted_store();
        backend.inner().insert_category("motion").unwrap();
        assert!(store.categories().is_empty());

        store.apply_event(ChangeEvent::CategoriesChanged);
        assert_eq!(store.categories(), ["motion".to_string()]);
    }

    #[test]
    fn test_upload_validation_happens_before_network() {
        let (backend, mut store) = scripted_store();

        let big = UploadFile::new("big.png", "image/png", vec![0; 11 * 1024 * 1024]);
        let size_err = store.upload_file(&big).unwrap_err();

        let text = UploadFile::new("notes.txt", "text/plain", b"hello".to_vec());
        let type_err = store.upload_file(&text).unwrap_err();

        assert!(matches!(
            size_err,
            GalleryError::Validation(ValidationError::FileTooLarge { .. })
        ));
        assert!(matches!(
            type_err,
            GalleryError::Validation(ValidationError::UnsupportedType { .. })
        ));
        assert_ne!(size_err.to_string(), type_err.to_string());
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_upload_returns_public_url() {
        let (backend, mut store) = scripted_store();
        let file = UploadFile::new("hero.webp", "image/webp", vec![1, 2, 3]);

        let url = store.upload_file(&file).unwrap();

        assert!(url.starts_with("https://cdn.test/portfolio/"));
        assert!(url.ends_with(".webp"));
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_upload_unsupported_by_local_backend() {
        let mut store = local_store();
        let file = UploadFile::new("hero.png", "image/png", vec![1]);
        let err = store.upload_file(&file).unwrap_err();
        assert!(matches!(err, GalleryError::Upload { .. }));
    }

    #[test]
    fn test_upload_checks_backend_support_first() {
        let (backend, mut store) = scripted_store();
        backend.no_upload.store(true, Ordering::SeqCst);
        let file = UploadFile::new("hero.png", "image/png", vec![1]);

        let err = store.upload_file(&file).unwrap_err();

        assert!(matches!(err, GalleryError::Upload { .. }));
        assert!(err.to_string().contains("scripted"));
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_publish_files_continues_past_failures() {
        let (backend, mut store) = scripted_store();
        let files = vec![
            UploadFile::new("readme.txt", "text/plain", b"x".to_vec()),
            UploadFile::new("cover.jpg", "image/jpeg", vec![1, 2]),
        ];
        let template = ImageTemplate {
            category: "Branding".to_string(),
            ..Default::default()
        };

        let report = store.publish_files(&files, &template).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "readme.txt");
        assert_eq!(report.added.len(), 1);

        let image = &report.added[0];
        assert_eq!(image.title, "cover");
        assert_eq!(image.category, "branding");
        assert_eq!(
            image.description.as_deref(),
            Some("Image 2 from branding category")
        );
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(store.categories(), ["branding".to_string()]);
    }

    #[test]
    fn test_publish_files_requires_files_and_category() {
        let (_, mut store) = scripted_store();
        let template = ImageTemplate {
            category: "branding".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            store.publish_files(&[], &template),
            Err(GalleryError::Validation(ValidationError::NoFiles))
        ));

        let files = vec![UploadFile::new("a.png", "image/png", vec![1])];
        assert!(matches!(
            store.publish_files(&files, &ImageTemplate::default()),
            Err(GalleryError::Validation(ValidationError::MissingCategory))
        ));
    }

    #[test]
    fn test_live_feed_merges_without_duplicates() {
        let backend = Arc::new(LocalStore::open_in_memory().unwrap());
        let mut store = GalleryStore::new(
            backend.clone(),
            StoreOptions {
                realtime: true,
                poll_interval: Duration::from_millis(10),
            },
        );
        assert!(store.initialize().is_ok());
        assert!(store.is_realtime_active());

        // Local add: the feed will report it again as an insert.
        let own = store.add_image(ImageInput::new("u-own", "branding")).unwrap();

        // Write from "another session" straight into the backend.
        let other = backend
            .insert_image(&NewImage {
                url: "u-other".to_string(),
                title: "Other".to_string(),
                category: "branding".to_string(),
                description: None,
            })
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while store.find_image(&other.id).is_none() && Instant::now() < deadline {
            store.poll_realtime();
            std::thread::sleep(Duration::from_millis(10));
        }
        std::thread::sleep(Duration::from_millis(50));
        store.poll_realtime();

        assert!(store.find_image(&other.id).is_some());
        assert_eq!(
            store.images().iter().filter(|i| i.id == own.id).count(),
            1
        );
        assert_eq!(store.images().len(), 2);

        store.shutdown().unwrap();
        assert!(!store.is_realtime_active());
        assert_eq!(store.poll_realtime(), 0);
    }
}
