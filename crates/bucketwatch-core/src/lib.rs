//! bucketwatch-core — shared types for the bucket watcher.
//!
//! Holds everything that does not touch I/O:
//!
//! - [`WatchConfig`] and its validation rules
//! - the three-way change detector ([`compute_diff`])
//! - first-match-wins topic routing ([`TopicRouter`])
//! - `gs://` object url helpers
//! - the daemon's TOML configuration ([`DaemonConfig`])

pub mod config;
pub mod diff;
pub mod duration;
pub mod routing;
pub mod types;
pub mod url;
pub mod watch;

pub use config::DaemonConfig;
pub use diff::{DiffResult, compute_diff};
pub use routing::TopicRouter;
pub use types::*;
pub use watch::{ValidationError, WatchConfig, WatchDraft};
