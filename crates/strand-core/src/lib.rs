//! # Providers, watching, and invalidation
//!
//! Strand keeps application state in a graph of named, memoized computations
//! ("providers") owned by a [`ProviderContainer`]. There are three kinds:
//!
//! - [`Provider<T>`]: synchronous, recomputed only when something it watched changed.
//! - [`FutureProvider<T>`]: asynchronous, observed as [`ProviderState`]
//!   (`Loading`, `Data`, `Error`); concurrent readers share one computation.
//! - [`StateProvider<T>`]: a mutable cell seeded by an initializer.
//!
//! Families ([`ProviderFamily`], [`FutureProviderFamily`]) create one
//! independent provider per parameter value.
//!
//! ## Watching
//!
//! Every computation receives a [`Ref`]. Reads made through `watch*` are
//! recorded as edges of the graph, so when an upstream provider is
//! invalidated, the reader is marked dirty and recomputes on its next read:
//!
//! ```rust
//! use futures::executor::LocalPool;
//! use strand_core::*;
//!
//! let pool = LocalPool::new();
//! let container = ProviderContainer::new(pool.spawner());
//!
//! let first = StateProvider::new("first", |_| "Jane".to_string());
//! let full = Provider::new("full", {
//!     let first = first.clone();
//!     move |r| format!("{} Doe", r.watch_state(&first))
//! });
//!
//! assert_eq!(container.read(&full), "Jane Doe");
//! container.set_state(&first, "John".to_string());
//! assert_eq!(container.read(&full), "John Doe");
//! ```
//!
//! ## Invalidation
//!
//! [`ProviderContainer::invalidate`] drops a provider's cached state and marks
//! its transitive dependents dirty in one breadth-first pass. Nothing is
//! recomputed eagerly; [`ProviderContainer::listen`] callbacks are told so the
//! UI can re-read.
//!
//! ## Cleanup
//!
//! [`Ref::on_dispose`] registers a cleanup (cancel a ticker, close a
//! subscription) that runs before the computation is replaced, when the node
//! is invalidated, and on disposal.

pub mod container;
pub mod error;
pub mod graph;
pub mod key;
pub mod provider;
pub mod state;
pub mod time;

pub use container::*;
pub use error::*;
pub use graph::NodeId;
pub use key::*;
pub use provider::*;
pub use state::*;
pub use time::*;
