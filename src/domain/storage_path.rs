use std::fmt;

use super::RecordingId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn for_recording(recording_id: &RecordingId, filename: &str) -> Self {
        Self(format!(
            "recordings/{}/{}",
            recording_id.as_uuid(),
            sanitize_filename(filename)
        ))
    }

    /// Scratch location for ad-hoc provider diagnostics.
    pub fn for_provider_test(trial_id: &RecordingId, filename: &str) -> Self {
        Self(format!(
            "provider-tests/{}/{}",
            trial_id.as_uuid(),
            sanitize_filename(filename)
        ))
    }

    pub fn from_raw(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "audio".to_string()
    } else {
        cleaned
    }
}
