//! Filesystem primitives for in-flight transfers.
//!
//! A download is streamed into a partial file that lives next to its final
//! destination, so that placing it is a same-directory rename. All operations
//! go through `tokio::fs` and are safe to await from transfer engines. A
//! [`PartialFile`] that is neither committed nor discarded removes itself on
//! drop, which keeps interrupted transfers from leaving debris behind.

mod error;
mod partial;

pub use error::{Error, Result};
pub use partial::PartialFile;

use std::path::Path;

/// Create `dir` and all of its missing ancestors.
pub async fn ensure_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    tokio::fs::create_dir_all(dir).await.map_err(|e| Error::CreateDir {
        path:   dir.to_path_buf(),
        source: e,
    })
}

/// Remove a file, treating an already missing file as success.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Remove {
            path:   path.to_path_buf(),
            source: e,
        }),
    }
}
