//! # Strand application state
//!
//! Domain state for the music library and the workshop: albums, devices,
//! machine macros, production steps, unit timers, settings and the session.
//!
//! Data comes from the [`repository`] traits; [`providers`] cache it in a
//! [`strand_core::ProviderContainer`] and derive views from it; [`commands`]
//! mutate through the repositories and invalidate what became stale.
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use futures::executor::LocalPool;
//! use strand_app::{App, AppConfig, MemoryBackend, Repositories};
//! use strand_core::{ManualTicker, ProviderContainer, SystemClock};
//!
//! let mut pool = LocalPool::new();
//! let repos = Repositories::from_backend(Rc::new(MemoryBackend::seeded()));
//! let app = App::new(
//!     ProviderContainer::new(pool.spawner()),
//!     &repos,
//!     &AppConfig::default(),
//!     Rc::new(SystemClock),
//!     Rc::new(ManualTicker::new()),
//! );
//!
//! let albums = &app.providers.albums;
//! assert!(app.container.read(&albums.visible_albums).is_empty()); // still loading
//! pool.run_until_stalled();
//! assert_eq!(app.container.read(&albums.visible_albums).len(), 4);
//! ```

pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod model;
pub mod providers;
pub mod repository;
pub mod tests;

pub use app::App;
pub use config::{AppConfig, ConfigError};
pub use error::{AppError, RepositoryError, ValidationError};
pub use memory::MemoryBackend;
pub use providers::{AppProviders, Repositories};
