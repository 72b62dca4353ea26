//! bucketwatch-state — embedded state store for bucketwatch.
//!
//! Backed by [redb](https://docs.rs/redb), persists watch configurations and
//! the per-watch snapshot of tracked objects.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Tracked items use composite keys `{watch_id}:{url}`, so the watch id acts
//! as the ancestor key: items of different watches never collide even when
//! the same url is watched twice, and a prefix scan yields one watch's
//! snapshot.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::StateStore;
