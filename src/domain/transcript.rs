/// A span of recognized speech, optionally attributed to a speaker.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub speaker: Option<String>,
    pub text: String,
}

impl Utterance {
    pub fn new(speaker: Option<String>, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// Joins utterances into transcript text.
///
/// Consecutive utterances from the same speaker share one line; every speaker
/// change starts a new line prefixed with the speaker label. Without any
/// speaker attribution the utterances form a single line.
pub fn join_utterances(utterances: &[Utterance]) -> String {
    let has_speakers = utterances.iter().any(|u| u.speaker.is_some());
    let mut lines: Vec<(Option<&str>, String)> = Vec::new();

    for utterance in utterances {
        let text = utterance.text.trim();
        if text.is_empty() {
            continue;
        }

        let speaker = if has_speakers {
            utterance.speaker.as_deref()
        } else {
            None
        };

        match lines.last_mut() {
            Some((current, line)) if *current == speaker => {
                line.push(' ');
                line.push_str(text);
            }
            _ => lines.push((speaker, text.to_string())),
        }
    }

    lines
        .into_iter()
        .map(|(speaker, line)| match speaker {
            Some(label) => format!("{}: {}", speaker_prefix(label), line),
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn speaker_prefix(label: &str) -> String {
    if label.to_lowercase().starts_with("speaker") {
        label.to_string()
    } else {
        format!("Speaker {}", label)
    }
}
