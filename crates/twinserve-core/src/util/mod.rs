pub mod http;

use std::path::Path;

/// Create a directory (and parents) if it doesn't exist.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Truncate a string to at most `max` characters without splitting a char.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
