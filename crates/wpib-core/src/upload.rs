//! Post-verification hand-off of fetched files.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::storage::StorageWriter;

/// Receives each file once its digest has been confirmed by the server.
pub trait Uploader {
    fn upload(&self, site_id: &str, local_path: &Path) -> Result<()>;
}

/// Keeps files where they were downloaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUpload;

impl Uploader for NoUpload {
    fn upload(&self, site_id: &str, local_path: &Path) -> Result<()> {
        tracing::debug!(site = site_id, file = %local_path.display(), "no upload target configured");
        Ok(())
    }
}

/// Copies files into `<root>/<site_id>/`, e.g. a mounted remote volume.
#[derive(Debug, Clone)]
pub struct MirrorUploader {
    root: PathBuf,
}

impl MirrorUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn target_dir(&self, site_id: &str) -> PathBuf {
        self.root.join(site_id)
    }
}

impl Uploader for MirrorUploader {
    fn upload(&self, site_id: &str, local_path: &Path) -> Result<()> {
        let name = local_path
            .file_name()
            .with_context(|| format!("{} has no file name", local_path.display()))?;
        let dir = self.target_dir(site_id);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let target = dir.join(name);

        let mut src = fs::File::open(local_path)
            .with_context(|| format!("open {}", local_path.display()))?;
        let mut writer =
            StorageWriter::create(&target).with_context(|| format!("create {}", target.display()))?;
        let copied = io::copy(&mut src, &mut writer)
            .with_context(|| format!("copy to {}", target.display()))?;
        writer
            .finalize()
            .with_context(|| format!("finalize {}", target.display()))?;
        tracing::info!(site = site_id, target = %target.display(), bytes = copied, "uploaded");
        Ok(())
    }
}
