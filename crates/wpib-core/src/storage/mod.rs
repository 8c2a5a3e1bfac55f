//! Disk side of a transfer.
//!
//! Each download streams into `<name>.part` through its own [`StorageWriter`],
//! which is synced and atomically renamed on success and removed on every
//! other exit path.

mod writer;

pub use writer::StorageWriter;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `db.sql.bz2` → `db.sql.bz2.part`).
pub fn temp_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    std::path::PathBuf::from(o)
}

/// Suffix for a downloaded file whose digest the server did not confirm.
pub const REJECTED_SUFFIX: &str = ".rejected";

/// Where a rejected download is parked, outside the set of final names.
pub fn rejected_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(REJECTED_SUFFIX);
    std::path::PathBuf::from(o)
}
