use std::sync::{Arc, Mutex};

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::oneshot;

use scribeflow::application::ports::{
    AudioSource, PollOutcome, ProviderErrorKind, ProviderOutcome, TranscriptionOptions,
    TranscriptionProvider,
};
use scribeflow::domain::SentimentLabel;
use scribeflow::infrastructure::providers::AssemblyAiProvider;

use super::mock_server::start_mock_server;

#[derive(Default)]
struct Captured {
    uploads: usize,
    create_request: Option<Value>,
}

async fn start_mock_assemblyai_server(
    transcript: Value,
) -> (String, oneshot::Sender<()>, Arc<Mutex<Captured>>) {
    let captured = Arc::new(Mutex::new(Captured::default()));

    let on_upload = captured.clone();
    let on_create = captured.clone();
    let app = Router::new()
        .route(
            "/v2/upload",
            post(move || {
                let captured = on_upload.clone();
                async move {
                    captured.lock().unwrap().uploads += 1;
                    Json(json!({ "upload_url": "https://cdn.assemblyai.test/upload/abc" }))
                }
            }),
        )
        .route(
            "/v2/transcript",
            post(move |Json(body): Json<Value>| {
                let captured = on_create.clone();
                async move {
                    captured.lock().unwrap().create_request = Some(body);
                    Json(json!({ "id": "tx-123", "status": "queued" }))
                }
            }),
        )
        .route(
            "/v2/transcript/{id}",
            get(move |Path(id): Path<String>| {
                let transcript = transcript.clone();
                async move {
                    if id == "tx-123" {
                        Json(transcript).into_response()
                    } else {
                        (StatusCode::NOT_FOUND, "not found").into_response()
                    }
                }
            }),
        );

    let (base_url, shutdown_tx) = start_mock_server(app).await;
    (base_url, shutdown_tx, captured)
}

fn audio(url: Option<&str>) -> AudioSource {
    AudioSource {
        data: b"fake audio bytes".to_vec(),
        filename: "lecture.wav".to_string(),
        content_type: "audio/wav".to_string(),
        url: url.map(str::to_string),
    }
}

fn completed_transcript() -> Value {
    json!({
        "id": "tx-123",
        "status": "completed",
        "text": "Hello there. General Kenobi.",
        "confidence": 0.93,
        "audio_duration": 4.5,
        "language_code": "en_us",
        "words": [
            { "text": "Hello", "start": 0, "end": 400, "confidence": 0.99 }
        ],
        "utterances": [
            { "speaker": "A", "text": "Hello there.", "start": 0, "end": 1200 },
            { "speaker": "B", "text": "General Kenobi.", "start": 1300, "end": 2500 }
        ],
        "sentiment_analysis_results": [
            { "sentiment": "POSITIVE" },
            { "sentiment": "POSITIVE" },
            { "sentiment": "NEUTRAL" }
        ]
    })
}

#[tokio::test]
async fn given_local_audio_when_transcribing_then_uploaded_and_job_pending() {
    let (base_url, shutdown_tx, captured) = start_mock_assemblyai_server(Value::Null).await;
    let provider = AssemblyAiProvider::new("aai-key".to_string(), Some(base_url));
    let options = TranscriptionOptions {
        speaker_labels: true,
        ..Default::default()
    };

    let outcome = provider.transcribe(&audio(None), &options).await.unwrap();

    assert!(matches!(outcome, ProviderOutcome::Pending(job) if job.job_id == "tx-123"));
    let captured = captured.lock().unwrap();
    assert_eq!(captured.uploads, 1);
    let request = captured.create_request.as_ref().unwrap();
    assert_eq!(request["audio_url"], "https://cdn.assemblyai.test/upload/abc");
    assert_eq!(request["speaker_labels"], true);
    assert_eq!(request["language_detection"], true);
    assert!(request.get("language_code").is_none());
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_reachable_audio_url_when_transcribing_then_upload_skipped() {
    let (base_url, shutdown_tx, captured) = start_mock_assemblyai_server(Value::Null).await;
    let provider = AssemblyAiProvider::new("aai-key".to_string(), Some(base_url));
    let options = TranscriptionOptions {
        language: Some("nb".to_string()),
        ..Default::default()
    };

    provider
        .transcribe(&audio(Some("https://blob.test/a.wav")), &options)
        .await
        .unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(captured.uploads, 0);
    let request = captured.create_request.as_ref().unwrap();
    assert_eq!(request["audio_url"], "https://blob.test/a.wav");
    assert_eq!(request["language_code"], "nb");
    assert!(request.get("language_detection").is_none());
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_completed_job_when_polling_then_speakers_and_sentiment_normalized() {
    let (base_url, shutdown_tx, _) = start_mock_assemblyai_server(completed_transcript()).await;
    let provider = AssemblyAiProvider::new("aai-key".to_string(), Some(base_url));

    let outcome = provider.poll_status("tx-123").await.unwrap();

    let PollOutcome::Completed(result) = outcome else {
        panic!("expected a completed job");
    };
    assert_eq!(
        result.text,
        "Speaker A: Hello there.\nSpeaker B: General Kenobi."
    );
    assert_eq!(result.duration_seconds, Some(4.5));
    let metadata = result.metadata;
    assert_eq!(metadata.provider, "assemblyai");
    assert_eq!(metadata.job_id.as_deref(), Some("tx-123"));
    assert_eq!(metadata.language.as_deref(), Some("en_us"));
    assert_eq!(metadata.confidence, Some(0.93));
    assert_eq!(metadata.speaker_count(), 2);
    assert_eq!(metadata.speaker_labels[1].start, 1.3);
    assert_eq!(metadata.timestamps[0].end, 0.4);
    assert_eq!(metadata.sentiment.unwrap().label, SentimentLabel::Positive);
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_running_job_when_polling_then_still_processing() {
    let (base_url, shutdown_tx, _) =
        start_mock_assemblyai_server(json!({ "id": "tx-123", "status": "processing" })).await;
    let provider = AssemblyAiProvider::new("aai-key".to_string(), Some(base_url));

    let outcome = provider.poll_status("tx-123").await.unwrap();

    assert!(matches!(
        outcome,
        PollOutcome::StillProcessing { remote_status } if remote_status == "processing"
    ));
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_errored_job_when_polling_then_transcription_failed() {
    let (base_url, shutdown_tx, _) = start_mock_assemblyai_server(json!({
        "id": "tx-123",
        "status": "error",
        "error": "Audio duration is too short"
    }))
    .await;
    let provider = AssemblyAiProvider::new("aai-key".to_string(), Some(base_url));

    let err = provider.poll_status("tx-123").await.unwrap_err();

    assert_eq!(err.code, "TRANSCRIPTION_FAILED");
    assert_eq!(err.message, "Audio duration is too short");
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_unknown_job_when_polling_then_job_not_found() {
    let (base_url, shutdown_tx, _) = start_mock_assemblyai_server(Value::Null).await;
    let provider = AssemblyAiProvider::new("aai-key".to_string(), Some(base_url));

    let err = provider.poll_status("tx-missing").await.unwrap_err();

    assert_eq!(err.kind, ProviderErrorKind::JobNotFound);
    assert_eq!(err.code, "JOB_NOT_FOUND");
    assert!(!err.recoverable);
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_completed_job_without_text_when_polling_then_empty_transcript() {
    let (base_url, shutdown_tx, _) = start_mock_assemblyai_server(json!({
        "id": "tx-123",
        "status": "completed",
        "text": ""
    }))
    .await;
    let provider = AssemblyAiProvider::new("aai-key".to_string(), Some(base_url));

    let err = provider.poll_status("tx-123").await.unwrap_err();

    assert_eq!(err.code, "EMPTY_TRANSCRIPT");
    shutdown_tx.send(()).ok();
}
