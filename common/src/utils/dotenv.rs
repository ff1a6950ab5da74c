//! Minimal `.env` loader.

use std::path::Path;

/// Loads `KEY=VALUE` lines from `path` into the process environment.
///
/// Best-effort: a missing or unreadable file is ignored, and variables that
/// are already set are never overridden. Returns the number of variables set.
pub fn load_dotenv(path: impl AsRef<Path>) -> usize {
    let Ok(content) = std::fs::read_to_string(path.as_ref()) else {
        return 0;
    };

    let mut loaded = 0;
    for (key, value) in parse_lines(&content) {
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
            loaded += 1;
        }
    }
    loaded
}

fn parse_lines(content: &str) -> impl Iterator<Item = (&str, &str)> {
    content.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (key, value) = line.split_once('=')?;
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some((key.trim(), value))
    })
}
