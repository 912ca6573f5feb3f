//! Path utilities for safe and robust file path handling.
//!
//! Helpers for display names, hidden-entry detection, output naming and the
//! scratch location used for normalized image copies.

use crate::error::{Error, Result};

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Scratch sub-directory created under the system temp dir.
const SCRATCH_DIR_NAME: &str = "evidoc";

/// Timestamp layout of generated document names.
const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Gets the display name of a path with fallback to lossy conversion.
///
/// Paths without a final component (e.g. `/` or `C:\`) fall back to the
/// whole path rendered lossily.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path_to_string_lossy(path))
}

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Safely gets the file stem from a path as a UTF-8 string.
pub fn file_stem_safe(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|name| name.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::PathUtf8Error(path.to_path_buf()))
}

/// Checks if a filename starts with a dot (hidden entry).
pub fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Sanitizes a filename by replacing invalid characters with safe alternatives.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | '"' | '|' | '?' | '*' => '-',
            ':' => '-',
            '/' | '\\' => '-',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Builds `<prefix>_<YYYYMMDD_HHMMSS>.docx`.
pub fn output_file_name(prefix: &str, at: DateTime<Local>) -> String {
    format!(
        "{}_{}.docx",
        sanitize_filename(prefix),
        at.format(OUTPUT_TIMESTAMP_FORMAT)
    )
}

/// Checks that a source folder is set, exists and is a directory.
pub fn validate_source_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::NoSourceSelected);
    }
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "Source path does not exist: {:?}",
            path
        )));
    }
    if !path.is_dir() {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            "Source path is not a directory.".to_string(),
        ));
    }
    Ok(())
}

/// Resolves the scratch directory, defaulting to `<system temp>/evidoc`.
pub fn scratch_dir(configured: Option<&Path>) -> PathBuf {
    configured
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::temp_dir().join(SCRATCH_DIR_NAME))
}

/// Returns a fresh path inside `dir` for the normalized copy of `source`.
///
/// Names are unique within the process: `<stem>_<pid>_<counter>_normalized.jpg`.
pub fn unique_scratch_path(dir: &Path, source: &Path) -> PathBuf {
    let stem = file_stem_safe(source)
        .map(|s| sanitize_filename(&s))
        .unwrap_or_else(|_| "image".to_string());
    let counter = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(
        "{}_{}_{}_normalized.jpg",
        stem,
        std::process::id(),
        counter
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::Path;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("root/第1章")), "第1章");
        assert_eq!(display_name(Path::new("test/file.txt")), "file.txt");
        assert_eq!(display_name(Path::new("/")), "/");
    }

    #[test]
    fn test_is_hidden_file() {
        assert!(is_hidden_file(Path::new(".hidden")));
        assert!(is_hidden_file(Path::new("dir/.DS_Store")));
        assert!(!is_hidden_file(Path::new("normal.txt")));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test<file>"), "test-file-");
        assert_eq!(sanitize_filename("a/b\\c"), "a-b-c");
        assert_eq!(sanitize_filename("佐证材料"), "佐证材料");
    }

    #[test]
    fn test_output_file_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            output_file_name("佐证材料", at),
            "佐证材料_20240309_070501.docx"
        );
        assert_eq!(output_file_name("a:b", at), "a-b_20240309_070501.docx");
    }

    #[test]
    fn test_validate_source_dir() {
        assert!(matches!(
            validate_source_dir(Path::new("")),
            Err(Error::NoSourceSelected)
        ));
        assert!(matches!(
            validate_source_dir(Path::new("definitely/not/here/evidoc")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_unique_scratch_paths_differ() {
        let dir = Path::new("/tmp/scratch");
        let a = unique_scratch_path(dir, Path::new("photos/img 1.png"));
        let b = unique_scratch_path(dir, Path::new("photos/img 1.png"));
        assert_ne!(a, b);
        assert!(a.starts_with(dir));
        assert!(display_name(&a).starts_with("img 1_"));
        assert!(display_name(&a).ends_with("_normalized.jpg"));
    }
}
