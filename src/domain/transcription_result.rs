use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-normalized transcription output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResult {
    pub text: String,
    pub duration_seconds: Option<f64>,
    pub metadata: TranscriptMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMetadata {
    pub provider: String,
    pub model: String,
    pub language: Option<String>,
    pub job_id: Option<String>,
    pub confidence: Option<f64>,
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub speaker_labels: Vec<SpeakerLabel>,
    #[serde(default)]
    pub timestamps: Vec<WordTimestamp>,
    pub processed_at: DateTime<Utc>,
    pub processing_time_ms: Option<i64>,
}

impl TranscriptMetadata {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            language: None,
            job_id: None,
            confidence: None,
            sentiment: None,
            speaker_labels: Vec::new(),
            timestamps: Vec::new(),
            processed_at: Utc::now(),
            processing_time_ms: None,
        }
    }

    pub fn speaker_count(&self) -> usize {
        let mut speakers: Vec<&str> = self
            .speaker_labels
            .iter()
            .map(|s| s.speaker.as_str())
            .collect();
        speakers.sort_unstable();
        speakers.dedup();
        speakers.len()
    }
}

/// One utterance attributed to a speaker, offsets in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerLabel {
    pub speaker: String,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTimestamp {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub score: f64,
    pub label: SentimentLabel,
}

const POLARITY_THRESHOLD: f64 = 0.25;

impl Sentiment {
    /// Collapses per-sentence polarities in `[-1, 1]` into one coarse score.
    pub fn from_polarities(polarities: &[f64]) -> Option<Self> {
        if polarities.is_empty() {
            return None;
        }

        let score = polarities.iter().sum::<f64>() / polarities.len() as f64;
        let label = if score > POLARITY_THRESHOLD {
            SentimentLabel::Positive
        } else if score < -POLARITY_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        Some(Self { score, label })
    }
}
