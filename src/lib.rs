//! Gallery state and data sync for a portfolio site.
//!
//! [`GalleryStore`] is the in-memory source of truth for images and
//! categories. It persists through a [`GalleryBackend`] (local SQLite or the
//! hosted backend) and stays current through a polling change feed.

pub mod admin;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod notification;
pub mod realtime;
pub mod store;
pub mod upload;
pub mod view;

pub use admin::AdminGate;
pub use backend::{open_backend, GalleryBackend, LocalStore, RemoteGateway};
pub use config::{BackendType, Config};
pub use error::{GalleryError, ValidationError};
pub use model::{GalleryImage, ImageInput, NewImage};
pub use notification::{Notification, NotificationLevel};
pub use realtime::{ChangeEvent, RealtimeListener};
pub use store::{GalleryStore, ImageTemplate, LoadReport, PublishReport, StoreOptions};
pub use upload::UploadFile;
pub use view::GalleryView;
