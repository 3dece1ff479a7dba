use std::path::{Path, PathBuf};

use url::Url;

use crate::{DocStoreError, Result};

/// Engine selected by the DSN scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Sqlite,
}

/// Detect the engine from the DSN scheme.
pub fn detect_backend(dsn: &str) -> Result<Backend> {
    let raw = dsn.trim();
    if raw.is_empty() {
        return Err(DocStoreError::UnsupportedDsn("empty DSN".into()));
    }
    let url = Url::parse(raw).map_err(|e| DocStoreError::UnsupportedDsn(format!("{raw}: {e}")))?;
    match url.scheme() {
        "memory" | "mem" => Ok(Backend::Memory),
        "sqlite" | "sqlite3" => Ok(Backend::Sqlite),
        other => Err(DocStoreError::UnsupportedDsn(format!(
            "unsupported scheme '{other}'"
        ))),
    }
}

/// True for SQLite in-memory DSNs.
pub fn is_sqlite_memory(dsn: &str) -> bool {
    let d = dsn.trim().to_ascii_lowercase();
    d == "sqlite::memory:" || d.starts_with("sqlite://:memory:") || d.contains("mode=memory")
}

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps in-memory DSNs as `sqlite::memory:`.
/// - Normalizes backslashes into forward slashes (important on Windows).
/// - Appends `mode=rwc` so the database file is created on first use.
pub fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path, create_dirs: bool) -> Result<String> {
    if is_sqlite_memory(dsn) {
        return Ok("sqlite::memory:".to_string());
    }
    let db_path = dsn
        .trim()
        .strip_prefix("sqlite://")
        .or_else(|| dsn.trim().strip_prefix("sqlite3://"))
        .ok_or_else(|| {
            DocStoreError::UnsupportedDsn(format!("DSN must start with sqlite:// (got: {dsn})"))
        })?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(DocStoreError::UnsupportedDsn("empty SQLite path in DSN".into()));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }

    if create_dirs {
        if let Some(dir) = p.parent() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let mut params: Vec<&str> = query
        .map(|q| q.split('&').filter(|kv| !kv.is_empty()).collect())
        .unwrap_or_default();
    if !params.iter().any(|kv| kv.starts_with("mode=")) {
        params.push("mode=rwc");
    }

    Ok(format!(
        "sqlite://{}?{}",
        p.to_string_lossy().replace('\\', "/"),
        params.join("&")
    ))
}
