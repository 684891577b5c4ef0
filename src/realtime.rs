//! Change feed for the image and category collections.
//!
//! Each channel runs on its own background thread, polls its collection
//! through the backend and diffs it against the previous snapshot. Events
//! are delivered over an mpsc channel and applied by the thread that owns
//! the store, one at a time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::backend::GalleryBackend;
use crate::error::GalleryError;
use crate::model::GalleryImage;

/// Granularity at which workers notice cancellation
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// A change observed on one of the watched collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    ImageInserted(GalleryImage),
    ImageUpdated(GalleryImage),
    ImageDeleted { id: String },
    /// Categories carry no payload; consumers re-fetch the full set.
    CategoriesChanged,
}

impl ChangeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::ImageInserted(_) => "INSERT",
            ChangeEvent::ImageUpdated(_) => "UPDATE",
            ChangeEvent::ImageDeleted { .. } => "DELETE",
            ChangeEvent::CategoriesChanged => "CATEGORIES",
        }
    }
}

/// Last known state of the image collection
#[derive(Debug, Default)]
pub struct ImageSnapshot {
    known: HashMap<String, GalleryImage>,
}

impl ImageSnapshot {
    pub fn new(images: &[GalleryImage]) -> Self {
        Self {
            known: images
                .iter()
                .map(|image| (image.id.clone(), image.clone()))
                .collect(),
        }
    }

    /// Compare against a fresh newest-first listing and remember it.
    ///
    /// Inserts are emitted oldest first so that prepending them in order
    /// leaves the newest record at the front.
    pub fn diff(&mut self, latest: Vec<GalleryImage>) -> Vec<ChangeEvent> {
        let mut events = Vec::new();

        for image in latest.iter().rev() {
            match self.known.get(&image.id) {
                None => events.push(ChangeEvent::ImageInserted(image.clone())),
                Some(previous) if previous != image => {
                    events.push(ChangeEvent::ImageUpdated(image.clone()))
                }
                Some(_) => {}
            }
        }

        let latest: HashMap<String, GalleryImage> = latest
            .into_iter()
            .map(|image| (image.id.clone(), image))
            .collect();

        let mut removed: Vec<&String> = self
            .known
            .keys()
            .filter(|id| !latest.contains_key(*id))
            .collect();
        removed.sort();
        events.extend(
            removed
                .into_iter()
                .map(|id| ChangeEvent::ImageDeleted { id: id.clone() }),
        );

        self.known = latest;
        events
    }
}

/// Last known category set
#[derive(Debug, Default)]
pub struct CategorySnapshot {
    names: Vec<String>,
}

impl CategorySnapshot {
    pub fn new(names: &[String]) -> Self {
        let mut names = names.to_vec();
        names.sort();
        Self { names }
    }

    pub fn diff(&mut self, mut latest: Vec<String>) -> Option<ChangeEvent> {
        latest.sort();
        if latest == self.names {
            None
        } else {
            self.names = latest;
            Some(ChangeEvent::CategoriesChanged)
        }
    }
}

/// Running subscriptions for both collections.
///
/// Dropping the listener stops and joins its workers.
pub struct RealtimeListener {
    receiver: mpsc::Receiver<ChangeEvent>,
    cancel_flag: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl RealtimeListener {
    /// Subscribe to both collections, starting from the given snapshot.
    pub fn start(
        backend: Arc<dyn GalleryBackend>,
        images: &[GalleryImage],
        categories: &[String],
        poll_interval: Duration,
    ) -> Result<Self, GalleryError> {
        let (tx, receiver) = mpsc::channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let mut listener = Self {
            receiver,
            cancel_flag: cancel_flag.clone(),
            workers: Vec::new(),
        };

        let mut image_snapshot = ImageSnapshot::new(images);
        let image_backend = backend.clone();
        let image_worker = spawn_worker(
            "portfolio_images_changes",
            tx.clone(),
            cancel_flag.clone(),
            poll_interval,
            move || Ok(image_snapshot.diff(image_backend.list_images()?)),
        );

        let mut category_snapshot = CategorySnapshot::new(categories);
        let category_worker = spawn_worker(
            "portfolio_categories_changes",
            tx,
            cancel_flag,
            poll_interval,
            move || {
                Ok(category_snapshot
                    .diff(backend.list_categories()?)
                    .into_iter()
                    .collect())
            },
        );

        for worker in [image_worker, category_worker] {
            match worker {
                Ok(handle) => listener.workers.push(handle),
                Err(e) => {
                    // Tear down whatever did start before reporting.
                    if let Err(stop_err) = listener.stop() {
                        tracing::warn!(error = %stop_err, "Failed to stop partial subscription");
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!(
            interval_ms = poll_interval.as_millis() as u64,
            channels = listener.workers.len(),
            "Realtime subscriptions started"
        );
        Ok(listener)
    }

    /// All events received so far, without blocking.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty() && !self.cancel_flag.load(Ordering::SeqCst)
    }

    /// Signal the workers and join them.
    pub fn stop(&mut self) -> Result<(), GalleryError> {
        self.cancel_flag.store(true, Ordering::SeqCst);

        let mut failed = Vec::new();
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("realtime").to_string();
            if worker.join().is_err() {
                failed.push(name);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(GalleryError::subscription(format!(
                "channel worker panicked: {}",
                failed.join(", ")
            )))
        }
    }
}

impl Drop for RealtimeListener {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "Realtime teardown failed");
        }
    }
}

fn spawn_worker<F>(
    channel: &'static str,
    tx: mpsc::Sender<ChangeEvent>,
    cancel_flag: Arc<AtomicBool>,
    poll_interval: Duration,
    mut poll: F,
) -> Result<JoinHandle<()>, GalleryError>
where
    F: FnMut() -> anyhow::Result<Vec<ChangeEvent>> + Send + 'static,
{
    std::thread::Builder::new()
        .name(channel.to_string())
        .spawn(move || {
            tracing::debug!(channel, "Subscribed");
            while wait_or_cancel(&cancel_flag, poll_interval) {
                match poll() {
                    Ok(events) => {
                        for event in events {
                            tracing::debug!(channel, kind = event.kind(), "Change received");
                            if tx.send(event).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(channel, error = %e, "Change feed poll failed");
                    }
                }
            }
            tracing::debug!(channel, "Unsubscribed");
        })
        .map_err(|e| GalleryError::subscription(format!("failed to start {}: {}", channel, e)))
}

/// Sleep for `interval`, returning false as soon as cancellation is requested.
fn wait_or_cancel(cancel_flag: &AtomicBool, interval: Duration) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if cancel_flag.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(CANCEL_CHECK_INTERVAL.min(deadline - now));
    }
}
