//! Local-name derivation for filenames reported by the server.

/// Reduce a server-reported filename to a safe local file name.
///
/// - Keeps only the last `/` or `\` separated component (the server may report
///   absolute paths)
/// - Replaces NUL and control characters with `_`
/// - Rejects empty names, `.` and `..`
/// - Limits length to 255 bytes (Linux NAME_MAX)
pub fn local_file_name(reported: &str) -> Option<String> {
    const NAME_MAX: usize = 255;

    let base = reported
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }

    let cleaned: String = base
        .chars()
        .map(|c| if c == '\0' || c.is_control() { '_' } else { c })
        .collect();

    if cleaned.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !cleaned.is_char_boundary(take) {
            take -= 1;
        }
        Some(cleaned[..take].to_string())
    } else {
        Some(cleaned)
    }
}
