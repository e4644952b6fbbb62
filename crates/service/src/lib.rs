//! HTTP front end: accepts uploads, normalises and transcribes them, serves the MIDI back.

pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod retention;
pub mod router;
pub mod state;
pub mod storage;

pub use config::{
    ConfigError, CorsConfig, NormalizerConfig, NormalizerKind, RetentionConfig, ServiceConfig,
    TranscriberConfig, TranscriberKind,
};
pub use error::ServiceError;
pub use handlers::MidiFileResponse;
pub use pipeline::TranscriptionPipeline;
pub use retention::{spawn_sweeper, sweep_dir};
pub use state::AppState;
pub use storage::Storage;
