//! Session output directory preparation.

use std::path::Path;

use bootlogger_core::PipelineError;

/// Removes `path` with everything under it and creates it again, empty.
///
/// Any failure is fatal for the session.
pub async fn reset_output_dir(path: &Path) -> Result<(), PipelineError> {
    if path.as_os_str().is_empty() {
        return Err(PipelineError::OutputDir {
            path: String::new(),
            reason: "empty path".to_owned(),
        });
    }

    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed previous session output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(PipelineError::OutputDir {
                path: path.display().to_string(),
                reason: format!("failed to remove: {e}"),
            });
        }
    }

    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| PipelineError::OutputDir {
            path: path.display().to_string(),
            reason: format!("failed to create: {e}"),
        })?;

    tracing::info!(path = %path.display(), "output directory ready");
    Ok(())
}
