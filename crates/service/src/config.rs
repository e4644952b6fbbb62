use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use humscribe_transcriber::constants::DEFAULT_MODEL_PATH;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NormalizerKind {
    /// symphonia, then ffmpeg for what it cannot decode
    #[default]
    Auto,
    Symphonia,
    Ffmpeg,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriberKind {
    #[default]
    Onnx,
    Command,
}

impl FromStr for NormalizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "symphonia" => Ok(Self::Symphonia),
            "ffmpeg" => Ok(Self::Ffmpeg),
            other => Err(format!("unknown normalizer `{other}` (auto, symphonia, ffmpeg)")),
        }
    }
}

impl FromStr for TranscriberKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "command" => Ok(Self::Command),
            other => Err(format!("unknown transcriber `{other}` (onnx, command)")),
        }
    }
}

impl fmt::Display for NormalizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Symphonia => "symphonia",
            Self::Ffmpeg => "ffmpeg",
        })
    }
}

impl fmt::Display for TranscriberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Onnx => "onnx",
            Self::Command => "command",
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    pub backend: NormalizerKind,
    /// Resolved through `PATH` when not absolute.
    pub ffmpeg: PathBuf,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            backend: NormalizerKind::default(),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TranscriberConfig {
    pub backend: TranscriberKind,
    pub model: PathBuf,
    pub basic_pitch: PathBuf,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            backend: TranscriberKind::default(),
            model: PathBuf::from(DEFAULT_MODEL_PATH),
            basic_pitch: PathBuf::from("basic-pitch"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// `*` mirrors whatever origin the request carries.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: [
                "http://localhost:5173",
                "http://localhost:8100",
                "http://192.168.1.10:8100",
                "*",
                "capacitor://localhost",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    /// Files older than this are deleted from both directories. `None` keeps everything.
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_age: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    /// `None` accepts uploads of any size.
    pub max_upload_bytes: Option<usize>,
    /// Answer unknown downloads with 404 instead of 200.
    pub strict_download_status: bool,
    pub normalizer: NormalizerConfig,
    pub transcriber: TranscriberConfig,
    pub cors: CorsConfig,
    pub retention: RetentionConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            max_upload_bytes: None,
            strict_download_status: false,
            normalizer: NormalizerConfig::default(),
            transcriber: TranscriberConfig::default(),
            cors: CorsConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn deserialize_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| humantime::parse_duration(&value).map_err(serde::de::Error::custom))
        .transpose()
}
