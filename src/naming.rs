//! Names derived from user input: the archive name of a backup and the
//! temporary file names of a restore.

use chrono::NaiveDateTime;

pub const SEPARATOR: char = '/';
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
/// Used when a restore URL has no last path segment.
pub const DEFAULT_RESTORE_NAME: &str = "restore";

/// Exactly one trailing separator. Idempotent.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.trim_end_matches(SEPARATOR).to_string();
    normalized.push(SEPARATOR);
    normalized
}

/// Last non-empty segment of the normalized path, `None` for `/`.
pub fn base_name(path: &str) -> Option<String> {
    normalize_path(path)
        .split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// `{base}-{YYYY-MM-DD-HH-MM-SS}`
pub fn archive_name(base: &str, timestamp: &NaiveDateTime) -> String {
    format!("{}-{}", base, timestamp.format(TIMESTAMP_FORMAT))
}

/// Last path segment of a URL, ignoring query and fragment.
pub fn url_file_name(url: &str) -> String {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.rsplit(SEPARATOR)
        .find(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_RESTORE_NAME)
        .to_string()
}

pub fn with_archive_suffix(name: &str) -> String {
    if name.ends_with(ARCHIVE_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, ARCHIVE_SUFFIX)
    }
}

/// Name of the plaintext written when decrypting a download called `name`.
/// Never equal to `name`.
pub fn decrypted_name(name: &str) -> String {
    match name.strip_suffix(ARCHIVE_SUFFIX) {
        Some(stem) => format!("{}-decrypted{}", stem, ARCHIVE_SUFFIX),
        None => with_archive_suffix(name),
    }
}
