use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::cors::cors_layer;
use crate::handlers::{download_midi, save_midi, upload_audio};
use crate::state::AppState;

pub fn build(state: AppState, config: &ServiceConfig) -> Router {
    let body_limit = match config.max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/upload-audio/", post(upload_audio))
        .route("/upload-audio", post(upload_audio))
        .route("/save-midi/", post(save_midi))
        .route("/save-midi", post(save_midi))
        .route("/download-midi/:filename", get(download_midi))
        .layer(body_limit)
        .layer(cors_layer(&config.cors.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use humscribe_audio::SymphoniaNormalizer;
    use humscribe_domain::NoteEvent;
    use humscribe_transcriber::{inspect_midi, MidiExporter, TranscribeError, Transcriber};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::pipeline::tests::{tone_bytes, FailingTranscriber, StubTranscriber};
    use crate::pipeline::TranscriptionPipeline;
    use crate::storage::Storage;

    const BOUNDARY: &str = "humscribe-test-boundary";

    fn app_with(dir: &Path, transcriber: Arc<dyn Transcriber>, config: &ServiceConfig) -> Router {
        let storage = Storage::new(dir.join("uploads"), dir.join("outputs"));
        storage.ensure_dirs().unwrap();
        let pipeline = TranscriptionPipeline::new(storage, Arc::new(SymphoniaNormalizer), transcriber);
        build(AppState::new(pipeline, config.strict_download_status), config)
    }

    fn app(dir: &Path) -> Router {
        app_with(dir, Arc::new(StubTranscriber), &ServiceConfig::default())
    }

    fn multipart(field: &str, filename: &str, bytes: &[u8]) -> Body {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn multipart_post(uri: &str, field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart(field, filename, bytes))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn upload_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let response = app
            .clone()
            .oneshot(multipart_post("/upload-audio/", "file", "hum.wav", &tone_bytes(44_100)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let midi_file = json(response).await["midi_file"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(midi_file.starts_with("raw_"));
        assert!(midi_file.ends_with("_hum_basic_pitch.mid"));

        let response = app
            .oneshot(get_request(&format!("/download-midi/{midi_file}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/midi");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            format!("attachment; filename=\"{midi_file}\"").as_str()
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, fs::read(dir.path().join("outputs").join(&midi_file)).unwrap());
        assert_eq!(inspect_midi(&body).unwrap().notes, 1);
    }

    #[tokio::test]
    async fn route_without_trailing_slash_also_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(multipart_post("/upload-audio", "file", "hum.wav", &tone_bytes(16_000)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn garbage_upload_is_unprocessable() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(multipart_post("/upload-audio/", "file", "notes.txt", b"plain text, not audio"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_file_field_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(multipart_post("/upload-audio/", "audio", "hum.wav", &tone_bytes(44_100)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json(response).await["error"].as_str().unwrap().contains("file"));

        let response = app(dir.path())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/upload-audio/")
                    .body(Body::from("not multipart"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn transcriber_failures_map_to_status() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::default();

        let broken = app_with(
            dir.path(),
            Arc::new(FailingTranscriber(|| TranscribeError::Inference("session crashed".into()))),
            &config,
        );
        let response = broken
            .oneshot(multipart_post("/upload-audio/", "file", "a.wav", &tone_bytes(44_100)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["error"], "inference failed: session crashed");

        let missing = app_with(
            dir.path(),
            Arc::new(FailingTranscriber(|| TranscribeError::Tool {
                tool: "basic-pitch".into(),
                message: "executable not found".into(),
            })),
            &config,
        );
        let response = missing
            .oneshot(multipart_post("/upload-audio/", "file", "b.wav", &tone_bytes(44_100)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn unknown_download_keeps_ok_status() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(get_request("/download-midi/nothing_basic_pitch.mid"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, serde_json::json!({ "error": "File not found" }));
    }

    #[tokio::test]
    async fn strict_mode_answers_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            strict_download_status: true,
            ..ServiceConfig::default()
        };
        let response = app_with(dir.path(), Arc::new(StubTranscriber), &config)
            .oneshot(get_request("/download-midi/nothing.mid"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["error"], "File not found");
    }

    #[tokio::test]
    async fn download_cannot_escape_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        fs::write(dir.path().join("uploads/raw_1_secret.mid"), b"MThd").unwrap();

        let response = app
            .oneshot(get_request("/download-midi/..%2Fuploads%2Fraw_1_secret.mid"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["error"], "File not found");
    }

    #[tokio::test]
    async fn sequential_uploads_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let first = app
            .clone()
            .oneshot(multipart_post("/upload-audio/", "file", "one.wav", &tone_bytes(44_100)))
            .await
            .unwrap();
        let second = app
            .oneshot(multipart_post("/upload-audio/", "file", "two.wav", &tone_bytes(44_100)))
            .await
            .unwrap();
        let first = json(first).await["midi_file"].clone();
        let second = json(second).await["midi_file"].clone();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn save_midi_stores_valid_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let note = NoteEvent::new(0.25, 0.75, 67, 0.6).unwrap();
        let bytes = MidiExporter::default().to_bytes(&[note]).unwrap();

        let response = app
            .clone()
            .oneshot(multipart_post("/save-midi/", "file", "edited.mid", &bytes))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stored = json(response).await["midi_file"].as_str().unwrap().to_string();
        assert!(stored.starts_with("edited_"));
        assert!(stored.ends_with("_edited.mid"));

        let response = app
            .clone()
            .oneshot(get_request(&format!("/download-midi/{stored}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/midi");

        let response = app
            .oneshot(multipart_post("/save-midi", "file", "edited.mid", b"RIFF not midi"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn preflight_mirrors_origin_with_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/upload-audio/")
            .header(header::ORIGIN, "http://somewhere.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let response = app(dir.path()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://somewhere.example"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
    }

    #[tokio::test]
    async fn listed_origins_only_without_wildcard() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.cors.allowed_origins = vec!["http://localhost:5173".into()];
        let app = app_with(dir.path(), Arc::new(StubTranscriber), &config);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/download-midi/x.mid")
                    .header(header::ORIGIN, "http://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn upload_limit_is_enforced_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            max_upload_bytes: Some(1024),
            ..ServiceConfig::default()
        };
        let response = app_with(dir.path(), Arc::new(StubTranscriber), &config)
            .oneshot(multipart_post("/upload-audio/", "file", "big.wav", &tone_bytes(44_100)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("upload too large"));
    }
}
