//! File digests computed after a transfer completes.
//!
//! MD5 is what the counterpart server confirms (`wpib_check_md5`), so it stays
//! the wire algorithm. SHA-256 is offered for local inspection only.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Stream a file through `hasher` in fixed-size chunks and return the lowercase hex digest.
fn digest_path<D: Digest>(path: &Path, mut hasher: D) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute MD5 of a file as lowercase hex. Memory use is bounded regardless of file size.
pub fn md5_path(path: &Path) -> io::Result<String> {
    digest_path(path, Md5::new())
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> io::Result<String> {
    digest_path(path, Sha256::new())
}
