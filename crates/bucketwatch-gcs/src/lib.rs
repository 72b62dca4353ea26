//! bucketwatch-gcs — transport adapters.
//!
//! Implements the reconciler's edge traits against real services:
//! [`GcsLister`] and [`LocalDirLister`] for `ObjectLister`, and
//! [`HttpPublisher`] for `Publisher`.

mod client;
pub mod lister;
pub mod local;
pub mod pubsub;

pub use client::HttpError;
pub use lister::GcsLister;
pub use local::LocalDirLister;
pub use pubsub::HttpPublisher;
