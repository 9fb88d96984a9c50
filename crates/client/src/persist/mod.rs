// Received image frames written out as <dir>/<step>.<ext>
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

pub struct FrameWriter {
    dir: PathBuf,
    extension: String,
}

impl FrameWriter {
    /// Create `dir` (and parents) if missing.
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            extension: extension.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, step: u32) -> PathBuf {
        self.dir.join(format!("{}.{}", step, self.extension))
    }

    /// Write one frame's bytes verbatim. Steps are numbered from 1.
    pub fn write(&self, step: u32, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(step);
        fs::write(&path, data)?;
        debug!("Saved {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }
}
