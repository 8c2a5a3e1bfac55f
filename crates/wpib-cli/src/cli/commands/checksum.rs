//! `wpib checksum` – digest of a local file.

use anyhow::{Context, Result};
use std::path::Path;
use wpib_core::checksum;

/// Print `<hex>  <path>`, MD5 unless `sha256` is set.
pub fn run_checksum(path: &Path, sha256: bool) -> Result<()> {
    let digest = if sha256 {
        checksum::sha256_path(path)
    } else {
        checksum::md5_path(path)
    }
    .with_context(|| format!("read {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
