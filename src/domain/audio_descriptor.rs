use super::StoragePath;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioDescriptor {
    /// Cleared by the retention sweep once the audio is purged.
    pub storage_path: Option<StoragePath>,
    pub filename: String,
    pub format: String,
    pub size_bytes: u64,
    pub duration_seconds: Option<f64>,
    pub language: Option<String>,
}

impl AudioDescriptor {
    pub fn new(
        storage_path: StoragePath,
        filename: impl Into<String>,
        format: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            storage_path: Some(storage_path),
            filename: filename.into(),
            format: format.into(),
            size_bytes,
            duration_seconds: None,
            language: None,
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn with_duration(mut self, duration_seconds: Option<f64>) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    pub fn content_type(&self) -> String {
        match self.format.to_lowercase().as_str() {
            "mp3" | "mpeg" => "audio/mpeg".to_string(),
            "wav" | "wave" => "audio/wav".to_string(),
            "m4a" | "mp4" => "audio/mp4".to_string(),
            "ogg" | "oga" => "audio/ogg".to_string(),
            "webm" => "audio/webm".to_string(),
            "flac" => "audio/flac".to_string(),
            other if other.contains('/') => other.to_string(),
            _ => "application/octet-stream".to_string(),
        }
    }
}
