use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use humscribe_audio::AudioError;
use humscribe_transcriber::TranscribeError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Failures of a request, each mapped to its own status code.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("upload too large: {0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Decode(String),
    #[error("{0}")]
    ConversionTool(String),
    #[error("{0}")]
    Inference(String),
    #[error("{0}")]
    Io(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ConversionTool(_) => StatusCode::BAD_GATEWAY,
            Self::Inference(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<AudioError> for ServiceError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::Io(err) => err.into(),
            AudioError::Tool { .. } => Self::ConversionTool(err.to_string()),
            AudioError::Decode(_) | AudioError::Wav(_) | AudioError::Resample(_) => {
                Self::Decode(err.to_string())
            }
        }
    }
}

impl From<TranscribeError> for ServiceError {
    fn from(err: TranscribeError) -> Self {
        match err {
            TranscribeError::Audio(err) => err.into(),
            TranscribeError::Io(err) => err.into(),
            TranscribeError::Tool { .. } => Self::ConversionTool(err.to_string()),
            TranscribeError::ModelLoad { .. }
            | TranscribeError::Inference(_)
            | TranscribeError::Midi(_) => Self::Inference(err.to_string()),
        }
    }
}

impl From<MultipartError> for ServiceError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.body_text())
        } else {
            Self::BadRequest(err.body_text())
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        } else {
            warn!(%status, error = %self, "request rejected");
        }
        let mut message = self.to_string();
        if message.trim().is_empty() {
            message = status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string();
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_has_distinct_status() {
        assert_eq!(
            ServiceError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::PayloadTooLarge("limit".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ServiceError::from(AudioError::decode("garbage")).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::from(AudioError::Tool {
                tool: "ffmpeg".into(),
                message: "executable not found".into(),
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::from(TranscribeError::Inference("nan".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn nested_audio_errors_keep_their_kind() {
        let err = ServiceError::from(TranscribeError::Audio(AudioError::decode("bad wav")));
        assert!(matches!(err, ServiceError::Decode(_)));
        assert!(err.to_string().contains("bad wav"));
    }

    #[test]
    fn empty_message_falls_back_to_reason() {
        let response = ServiceError::Io(String::new()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
