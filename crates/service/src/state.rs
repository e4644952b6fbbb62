use std::sync::Arc;

use axum::http::StatusCode;
use humscribe_audio::{FallbackNormalizer, FfmpegNormalizer, Normalizer, SymphoniaNormalizer};
use humscribe_transcriber::{
    BasicPitchModel, CommandTranscriber, ModelTranscriber, TranscribeError, Transcriber,
};
use tracing::info;

use crate::config::{NormalizerKind, ServiceConfig, TranscriberKind};
use crate::pipeline::TranscriptionPipeline;
use crate::storage::Storage;

/// Shared by every handler. The pipeline (and the model inside it) is built once.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TranscriptionPipeline>,
    /// Status sent with the `File not found` body.
    pub not_found_status: StatusCode,
}

impl AppState {
    pub fn new(pipeline: TranscriptionPipeline, strict_download_status: bool) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            not_found_status: if strict_download_status {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::OK
            },
        }
    }

    /// Builds the configured backends, loading the ONNX model when it is selected.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, TranscribeError> {
        let normalizer: Arc<dyn Normalizer> = match config.normalizer.backend {
            NormalizerKind::Auto => Arc::new(FallbackNormalizer::new(&config.normalizer.ffmpeg)),
            NormalizerKind::Symphonia => Arc::new(SymphoniaNormalizer),
            NormalizerKind::Ffmpeg => Arc::new(FfmpegNormalizer::new(&config.normalizer.ffmpeg)),
        };

        let transcriber: Arc<dyn Transcriber> = match config.transcriber.backend {
            TranscriberKind::Onnx => {
                let model = BasicPitchModel::load(&config.transcriber.model)?;
                Arc::new(ModelTranscriber::new(model))
            }
            TranscriberKind::Command => {
                let mut command = CommandTranscriber::new(&config.transcriber.basic_pitch);
                // otherwise basic-pitch falls back to its bundled model
                if config.transcriber.model.is_file() {
                    command = command.with_model_path(&config.transcriber.model);
                }
                Arc::new(command)
            }
        };

        info!(
            normalizer = normalizer.name(),
            transcriber = transcriber.name(),
            "transcription backends ready"
        );
        let pipeline = TranscriptionPipeline::new(Storage::from_config(config), normalizer, transcriber);
        Ok(Self::new(pipeline, config.strict_download_status))
    }
}
