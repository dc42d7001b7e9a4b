use chrono::Local;
use std::path::{Path, PathBuf};

/// Local wall-clock time in ISO-8601 form, used to stamp records
pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Path of `file_name` inside `dir` with its extension replaced
pub fn sibling_with_extension(dir: &Path, file_name: &str, extension: &str) -> PathBuf {
    dir.join(file_name).with_extension(extension)
}
