use std::sync::{Arc, Mutex};

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use tokio::sync::oneshot;

use scribeflow::application::ports::{
    AudioSource, ProviderErrorKind, ProviderOutcome, TranscriptionOptions, TranscriptionProvider,
};
use scribeflow::infrastructure::providers::OpenAiWhisperProvider;

use super::mock_server::start_mock_server;

async fn start_mock_openai_server(
    response_status: u16,
    response_body: &'static str,
) -> (String, oneshot::Sender<()>, Arc<Mutex<Option<String>>>) {
    let seen_auth = Arc::new(Mutex::new(None));
    let captured = seen_auth.clone();

    let app = Router::new().route(
        "/v1/audio/transcriptions",
        post(move |headers: HeaderMap| {
            let captured = captured.clone();
            async move {
                *captured.lock().unwrap() = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let status = StatusCode::from_u16(response_status).unwrap();
                (status, response_body).into_response()
            }
        }),
    );

    let (base_url, shutdown_tx) = start_mock_server(app).await;
    (format!("{}/v1", base_url), shutdown_tx, seen_auth)
}

fn audio() -> AudioSource {
    AudioSource {
        data: b"fake audio bytes".to_vec(),
        filename: "lecture.mp3".to_string(),
        content_type: "audio/mpeg".to_string(),
        url: None,
    }
}

fn options() -> TranscriptionOptions {
    TranscriptionOptions {
        language: Some("en".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn given_verbose_json_response_when_transcribing_then_result_normalized() {
    let body = r#"{
        "text": "  Hello from Whisper  ",
        "language": "english",
        "duration": 3.2,
        "segments": [{"avg_logprob": 0.0}, {"avg_logprob": 0.0}],
        "words": [{"word": "Hello", "start": 0.0, "end": 0.4}]
    }"#;
    let (base_url, shutdown_tx, seen_auth) = start_mock_openai_server(200, body).await;
    let provider = OpenAiWhisperProvider::new("sk-test".to_string(), Some(base_url), None);

    let outcome = provider.transcribe(&audio(), &options()).await.unwrap();

    let ProviderOutcome::Completed(result) = outcome else {
        panic!("expected a synchronous result");
    };
    assert_eq!(result.text, "Hello from Whisper");
    assert_eq!(result.duration_seconds, Some(3.2));
    assert_eq!(result.metadata.provider, "openai");
    assert_eq!(result.metadata.model, "whisper-1");
    assert_eq!(result.metadata.language.as_deref(), Some("english"));
    assert_eq!(result.metadata.confidence, Some(1.0));
    assert_eq!(result.metadata.timestamps.len(), 1);
    assert!(result.metadata.processing_time_ms.is_some());
    assert_eq!(
        seen_auth.lock().unwrap().as_deref(),
        Some("Bearer sk-test")
    );
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_service_unavailable_when_transcribing_then_recoverable_error() {
    let (base_url, shutdown_tx, _) = start_mock_openai_server(503, "overloaded").await;
    let provider = OpenAiWhisperProvider::new("sk-test".to_string(), Some(base_url), None);

    let err = provider.transcribe(&audio(), &options()).await.unwrap_err();

    assert_eq!(err.kind, ProviderErrorKind::Unavailable);
    assert_eq!(err.code, "HTTP_503");
    assert!(err.recoverable);
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_bad_request_when_transcribing_then_unrecoverable_error() {
    let body = r#"{"error": {"message": "Invalid file format."}}"#;
    let (base_url, shutdown_tx, _) = start_mock_openai_server(400, body).await;
    let provider = OpenAiWhisperProvider::new("sk-test".to_string(), Some(base_url), None);

    let err = provider.transcribe(&audio(), &options()).await.unwrap_err();

    assert_eq!(err.kind, ProviderErrorKind::Rejected);
    assert_eq!(err.code, "HTTP_400");
    assert!(!err.recoverable);
    assert!(err.message.contains("Invalid file format"));
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_blank_text_when_transcribing_then_empty_transcript_error() {
    let (base_url, shutdown_tx, _) = start_mock_openai_server(200, r#"{"text": "   "}"#).await;
    let provider = OpenAiWhisperProvider::new("sk-test".to_string(), Some(base_url), None);

    let err = provider.transcribe(&audio(), &options()).await.unwrap_err();

    assert_eq!(err.code, "EMPTY_TRANSCRIPT");
    assert!(!err.recoverable);
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_unparseable_body_when_transcribing_then_malformed_response() {
    let (base_url, shutdown_tx, _) = start_mock_openai_server(200, "not json").await;
    let provider = OpenAiWhisperProvider::new("sk-test".to_string(), Some(base_url), None);

    let err = provider.transcribe(&audio(), &options()).await.unwrap_err();

    assert_eq!(err.code, "MALFORMED_RESPONSE");
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_unreachable_host_when_transcribing_then_network_error_is_recoverable() {
    let provider = OpenAiWhisperProvider::new(
        "sk-test".to_string(),
        Some("http://127.0.0.1:1/v1".to_string()),
        None,
    );

    let err = provider.transcribe(&audio(), &options()).await.unwrap_err();

    assert_eq!(err.code, "NETWORK_ERROR");
    assert!(err.recoverable);
}

#[test]
fn given_openai_provider_when_inspected_then_synchronous() {
    let provider = OpenAiWhisperProvider::new("sk-test".to_string(), None, None);

    assert_eq!(provider.name(), "openai");
    assert!(!provider.completion_model().is_pollable());
}
