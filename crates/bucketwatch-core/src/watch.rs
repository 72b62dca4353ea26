//! Watch configuration and its validation rules.
//!
//! A watch pairs a bucket and an object-url pattern with the Pub/Sub topic
//! that receives change notifications. Validation runs on every create and
//! update, never on read.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::WatchId;

static TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\Aprojects/[^/]+/topics/[^/]+\z").expect("topic grammar is a valid regex")
});

/// Reasons a watch configuration is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid pattern: {pattern} ({reason})")]
    Pattern { pattern: String, reason: String },

    #[error("invalid topic: {0}")]
    Topic(String),

    #[error("invalid bucket: must not be empty")]
    EmptyBucket,
}

/// A persisted watch rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub id: WatchId,
    /// Display and routing order; lower sequences are consulted first.
    pub seq: i64,
    /// Bucket enumerated by a run.
    pub bucket: String,
    /// Regular expression matched against `gs://bucket/name` urls.
    pub pattern: String,
    /// Destination topic, `projects/<project>/topics/<topic>`.
    pub topic: String,
}

/// Create / update payload for a watch. The id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchDraft {
    /// Omitted on create means "after the last existing watch".
    #[serde(default)]
    pub seq: Option<i64>,
    pub bucket: String,
    pub pattern: String,
    pub topic: String,
}

impl WatchConfig {
    /// Check the pattern, topic, and bucket.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_rule(&self.bucket, &self.pattern, &self.topic)
    }

    /// Compile the match pattern.
    pub fn compiled_pattern(&self) -> Result<Regex, ValidationError> {
        compile_pattern(&self.pattern)
    }

    /// Build a config from a draft, keeping `id` and falling back to `seq`.
    pub fn from_draft(id: WatchId, seq: i64, draft: WatchDraft) -> Self {
        Self {
            id,
            seq: draft.seq.unwrap_or(seq),
            bucket: draft.bucket,
            pattern: draft.pattern,
            topic: draft.topic,
        }
    }
}

impl WatchDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_rule(&self.bucket, &self.pattern, &self.topic)
    }
}

/// Whether `topic` matches `projects/<id>/topics/<id>`.
pub fn is_valid_topic(topic: &str) -> bool {
    TOPIC_RE.is_match(topic)
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, ValidationError> {
    Regex::new(pattern).map_err(|e| ValidationError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn validate_rule(bucket: &str, pattern: &str, topic: &str) -> Result<(), ValidationError> {
    compile_pattern(pattern)?;
    if !is_valid_topic(topic) {
        return Err(ValidationError::Topic(topic.to_string()));
    }
    if bucket.trim().is_empty() {
        return Err(ValidationError::EmptyBucket);
    }
    Ok(())
}
