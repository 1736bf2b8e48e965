use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use engine_logging::engine_info;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::filename::artifact_filename;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot use output directory {path:?}: {reason}")]
    OutputDir { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Create `dir` (and parents) when missing; fail if it exists as a file.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let output_dir_error = |reason: String| PersistError::OutputDir {
        path: dir.to_path_buf(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(output_dir_error("exists and is not a directory".into())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| output_dir_error(e.to_string()))
        }
        Err(err) => Err(output_dir_error(err.to_string())),
    }
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        self.write_bytes(filename, content.as_bytes())
    }

    /// Overwrites `{dir}/{filename}`; readers never observe a half-written file.
    pub fn write_bytes(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Side artifacts of a run (screenshots, page-analysis notes), written under
/// one directory with timestamped names.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    writer: AtomicFileWriter,
}

impl ArtifactStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn save_screenshot(
        &self,
        png: &[u8],
        at: DateTime<Utc>,
    ) -> Result<PathBuf, PersistError> {
        let path = self
            .writer
            .write_bytes(&artifact_filename("screenshot", None, at, "png"), png)?;
        engine_info!("Saved screenshot {:?} ({} bytes)", path, png.len());
        Ok(path)
    }

    pub fn save_page_analysis(
        &self,
        host: Option<&str>,
        report: &str,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, PersistError> {
        let path = self
            .writer
            .write(&artifact_filename("page_analysis", host, at, "txt"), report)?;
        engine_info!("Saved page analysis {:?}", path);
        Ok(path)
    }
}
