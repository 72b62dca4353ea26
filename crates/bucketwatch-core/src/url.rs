//! `gs://` object url helpers.

const SCHEME: &str = "gs://";

/// Build the url identifying `name` inside `bucket`.
pub fn object_url(bucket: &str, name: &str) -> String {
    format!("{SCHEME}{bucket}/{name}")
}
