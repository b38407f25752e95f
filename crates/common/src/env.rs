//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{info, warn};

/// Create `dir` (and parents) when missing.
///
/// Permission denied is downgraded to a warning: the directory may still be
/// usable if it already exists under another owner. Any other error aborts.
pub async fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.as_os_str().is_empty() || tokio::fs::metadata(dir).await.is_ok() {
        return Ok(());
    }
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => {
            info!(dir = %dir.display(), "created directory");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            warn!(dir = %dir.display(), error = %e, "could not create directory (permission denied); will try to use it if it exists");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("cannot create {}: {e}", dir.display())),
    }
}

/// Ensure the parent directory of every given file path exists.
pub async fn ensure_parent_dirs<P: AsRef<Path>>(files: &[P]) -> anyhow::Result<()> {
    for file in files {
        if let Some(parent) = file.as_ref().parent() {
            ensure_dir(parent).await?;
        }
    }
    Ok(())
}
