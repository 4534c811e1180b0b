use std::path::{Path, PathBuf};

use chrono::Local;

use crate::utils::sanitize_filename;

/// Keep a copy of an uploaded sheet under `dir`. The stored name is the
/// sanitized basename prefixed with a timestamp, so uploads never overwrite
/// each other or escape the directory.
pub async fn store_upload(dir: &Path, original_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let name = format!(
        "{}_{}",
        Local::now().format("%Y%m%d-%H%M%S%.3f"),
        sanitize_filename(original_name)
    );
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "Stored upload");
    Ok(path)
}
