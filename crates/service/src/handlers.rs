use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::error::ServiceError;
use crate::state::AppState;

const FILE_FIELD: &str = "file";
const MIDI_CONTENT_TYPE: &str = "audio/midi";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MidiFileResponse {
    pub midi_file: String,
}

struct UploadedFile {
    name: String,
    bytes: Bytes,
}

async fn read_file_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadedFile, ServiceError> {
    let mut multipart = multipart.map_err(|err| ServiceError::BadRequest(err.body_text()))?;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok(UploadedFile { name, bytes });
    }
    Err(ServiceError::BadRequest(format!(
        "missing multipart field `{FILE_FIELD}`"
    )))
}

fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// `POST /upload-audio/`
#[instrument(skip_all)]
pub async fn upload_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MidiFileResponse>, ServiceError> {
    let upload = read_file_field(multipart).await?;
    info!(file = %upload.name, bytes = upload.bytes.len(), "received upload");

    let timestamp = unix_now();
    let pipeline = state.pipeline.clone();
    let midi_file = tokio::task::spawn_blocking(move || {
        pipeline.run(&upload.bytes, &upload.name, timestamp)
    })
    .await
    .map_err(|err| ServiceError::Io(format!("transcription task failed: {err}")))??;

    Ok(Json(MidiFileResponse { midi_file }))
}

/// `POST /save-midi/`
#[instrument(skip_all)]
pub async fn save_midi(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MidiFileResponse>, ServiceError> {
    let upload = read_file_field(multipart).await?;
    let timestamp = unix_now();
    let pipeline = state.pipeline.clone();
    let midi_file = tokio::task::spawn_blocking(move || {
        pipeline.save_edited(&upload.bytes, &upload.name, timestamp)
    })
    .await
    .map_err(|err| ServiceError::Io(format!("save task failed: {err}")))??;

    Ok(Json(MidiFileResponse { midi_file }))
}

/// `GET /download-midi/:filename`
#[instrument(skip(state))]
pub async fn download_midi(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ServiceError> {
    let Some(path) = state.pipeline.storage().resolve_output(&filename) else {
        info!("requested file does not exist");
        return Ok((
            state.not_found_status,
            Json(json!({ "error": "File not found" })),
        )
            .into_response());
    };
    let bytes = tokio::fs::read(&path).await?;
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static(MIDI_CONTENT_TYPE)),
            (CONTENT_DISPOSITION, attachment(&filename)),
        ],
        bytes,
    )
        .into_response())
}

/// `attachment; filename="..."`, switching to the RFC 5987 form for names that
/// cannot sit in a quoted string.
fn attachment(filename: &str) -> HeaderValue {
    let quotable = filename
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\');
    if quotable {
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")) {
            return value;
        }
    }
    let mut encoded = String::with_capacity(filename.len() * 3);
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    HeaderValue::from_str(&format!("attachment; filename*=utf-8''{encoded}"))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
