//! SQLite-backed key/value store for offline use.
//!
//! Both collections are kept as JSON documents under fixed keys, so the
//! whole image list is rewritten on every mutation.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::GalleryBackend;
use crate::model::{normalize_category, GalleryImage, NewImage};

pub const IMAGES_KEY: &str = "portfolio-images";
pub const CATEGORIES_KEY: &str = "portfolio-categories";

/// How long a writer waits for another handle's transaction to finish
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS gallery_kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

pub struct LocalStore {
    conn: Mutex<Connection>,
    /// Last id handed out, so ids stay distinct within one millisecond
    last_id: AtomicI64,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            last_id: AtomicI64::new(0),
        })
    }

    fn get<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let conn = self.lock()?;
        read_entry(&conn, key)
    }

    #[cfg(test)]
    fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let conn = self.lock()?;
        write_entry(&conn, key, value)
    }

    /// Read, change and write back one entry inside a single write transaction.
    ///
    /// The entry is only written back when `apply` reports a change.
    fn update<T, R>(&self, key: &str, apply: impl FnOnce(&mut T) -> (bool, R)) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut value: T = read_entry(&tx, key)?;
        let (changed, result) = apply(&mut value);
        if changed {
            write_entry(&tx, key, &value)?;
        }
        tx.commit()?;
        Ok(result)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Local store connection poisoned"))
    }

    /// Millisecond timestamp, bumped past the last issued id when needed.
    fn next_id(&self) -> String {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = self.last_id.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last_id
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate.to_string(),
                Err(current) => last = current,
            }
        }
    }
}

fn read_entry<T: DeserializeOwned + Default>(conn: &Connection, key: &str) -> Result<T> {
    let value: Option<String> = conn
        .query_row("SELECT value FROM gallery_kv WHERE key = ?", [key], |row| {
            row.get(0)
        })
        .optional()?;
    match value {
        Some(json) => {
            serde_json::from_str(&json).with_context(|| format!("Corrupt local entry '{}'", key))
        }
        None => Ok(T::default()),
    }
}

fn write_entry<T: Serialize>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    conn.execute(
        r#"
        INSERT INTO gallery_kv (key, value, updated_at)
        VALUES (?1, ?2, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        rusqlite::params![key, json],
    )?;
    Ok(())
}

impl GalleryBackend for LocalStore {
    fn list_images(&self) -> Result<Vec<GalleryImage>> {
        self.get(IMAGES_KEY)
    }

    fn list_categories(&self) -> Result<Vec<String>> {
        let mut categories: Vec<String> = self.get(CATEGORIES_KEY)?;
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    fn insert_image(&self, image: &NewImage) -> Result<GalleryImage> {
        self.update(IMAGES_KEY, |images: &mut Vec<GalleryImage>| {
            let mut record = GalleryImage {
                id: self.next_id(),
                url: image.url.clone(),
                title: image.title.clone(),
                category: image.category.clone(),
                description: image.description.clone(),
                created_at: Some(chrono::Utc::now()),
            };
            // Another handle may have issued the same id from its own counter.
            while images.iter().any(|existing| existing.id == record.id) {
                record.id = self.next_id();
            }
            images.insert(0, record.clone());
            (true, record)
        })
    }

    fn delete_image(&self, id: &str) -> Result<()> {
        self.update(IMAGES_KEY, |images: &mut Vec<GalleryImage>| {
            let before = images.len();
            images.retain(|image| image.id != id);
            (images.len() != before, ())
        })
    }

    fn insert_category(&self, name: &str) -> Result<()> {
        let name = normalize_category(name);
        self.update(CATEGORIES_KEY, |categories: &mut Vec<String>| {
            categories.sort();
            categories.dedup();
            match categories.binary_search(&name) {
                Ok(_) => (false, ()),
                Err(pos) => {
                    categories.insert(pos, name);
                    (true, ())
                }
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
