use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use humscribe_domain::{is_plain_filename, raw_upload_name, waveform_name};

use crate::config::ServiceConfig;

/// The two flat directories the service reads and writes.
#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl Storage {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(&config.upload_dir, &config.output_dir)
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.upload_dir)?;
        fs::create_dir_all(&self.output_dir)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn raw_upload_path(&self, timestamp: i64, original_name: &str) -> PathBuf {
        self.upload_dir
            .join(raw_upload_name(timestamp, original_name))
    }

    pub fn waveform_path(&self, raw: &Path) -> PathBuf {
        let raw_name = raw
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.upload_dir.join(waveform_name(&raw_name))
    }

    /// Writes the upload verbatim, replacing a same-named file from the same second.
    pub fn save_raw(&self, timestamp: i64, original_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.raw_upload_path(timestamp, original_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Looks `name` up directly inside the output directory.
    pub fn resolve_output(&self, name: &str) -> Option<PathBuf> {
        if !is_plain_filename(name) {
            return None;
        }
        let path = self.output_dir.join(name);
        path.is_file().then_some(path)
    }
}
