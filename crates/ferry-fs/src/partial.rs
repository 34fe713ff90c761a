use crate::{Error, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// A staging file placed in the destination's parent directory.
///
/// Bytes go in through [`PartialFile::write`]; the file is then either
/// [`commit`](PartialFile::commit)ted onto the destination or
/// [`discard`](PartialFile::discard)ed. Dropping an unsettled partial file
/// closes and removes it.
#[derive(Debug)]
pub struct PartialFile {
    partial_path:     PathBuf,
    destination_path: PathBuf,
    file:             Option<File>,
    settled:          bool,
}

impl PartialFile {
    /// Create `name` inside the destination's parent directory, creating the
    /// directory when it is missing.
    pub async fn create(destination: impl AsRef<Path>, name: impl AsRef<OsStr>) -> Result<Self> {
        let destination_path = destination.as_ref().to_path_buf();
        if destination_path.file_name().is_none() {
            return Err(Error::NoParent {
                path: destination_path,
            });
        }
        let parent = destination_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        crate::ensure_dir(&parent).await?;

        let partial_path = parent.join(name.as_ref());
        let file = File::create(&partial_path).await.map_err(|e| Error::Write {
            path:   partial_path.clone(),
            source: e,
        })?;
        Ok(Self {
            partial_path,
            destination_path,
            file: Some(file),
            settled: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.partial_path
    }

    pub fn destination(&self) -> &Path {
        &self.destination_path
    }

    /// Append `bytes` to the partial file.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let result = match self.file.as_mut() {
            Some(file) => file.write_all(bytes).await,
            None => Err(std::io::ErrorKind::BrokenPipe.into()),
        };
        result.map_err(|e| self.write_error(e))
    }

    /// Flush the partial file to disk and move it onto its destination,
    /// replacing any existing file.
    pub async fn commit(mut self) -> Result<PathBuf> {
        if let Some(mut file) = self.file.take() {
            let synced = match file.flush().await {
                Ok(()) => file.sync_all().await,
                Err(e) => Err(e),
            };
            synced.map_err(|e| self.write_error(e))?;
        }
        tokio::fs::rename(&self.partial_path, &self.destination_path)
            .await
            .map_err(|e| Error::Rename {
                from:   self.partial_path.clone(),
                to:     self.destination_path.clone(),
                source: e,
            })?;
        self.settled = true;
        Ok(self.destination_path.clone())
    }

    /// Close and delete the partial file.
    pub async fn discard(mut self) -> Result<()> {
        self.settled = true;
        if let Some(mut file) = self.file.take() {
            // Let pending writes land before unlinking.
            if let Err(e) = file.flush().await {
                tracing::debug!(path = %self.partial_path.display(), error = %e, "flush before discard failed");
            }
        }
        crate::remove_if_exists(&self.partial_path).await.map(|_| ())
    }

    fn write_error(&self, source: std::io::Error) -> Error {
        Error::Write {
            path: self.partial_path.clone(),
            source,
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        drop(self.file.take());
        match std::fs::remove_file(&self.partial_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.partial_path.display(), error = %e, "failed to remove partial file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_partial_file_commit() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out").join("file.bin");
        let mut partial = PartialFile::create(&dest, ".file.part").await.unwrap();
        assert_eq!(partial.path(), dir.path().join("out").join(".file.part"));
        partial.write(b"da").await.unwrap();
        partial.write(b"ta").await.unwrap();

        let placed = partial.commit().await.unwrap();
        assert_eq!(placed, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"data");
        assert!(!dir.path().join("out").join(".file.part").exists());
    }

    #[tokio::test]
    async fn test_partial_file_cleanup_on_drop() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        let staged = {
            let mut partial = PartialFile::create(&dest, ".file.part").await.unwrap();
            partial.write(b"half").await.unwrap();
            partial.path().to_path_buf()
        };
        assert!(!staged.exists());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_partial_file_discard_after_writes() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        let mut partial = PartialFile::create(&dest, ".file.part").await.unwrap();
        partial.write(&[7u8; 64 * 1024]).await.unwrap();
        let staged = partial.path().to_path_buf();
        assert!(staged.exists());

        partial.discard().await.unwrap();
        assert!(!staged.exists());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_partial_file_rejects_directory_like_destination() {
        let result = PartialFile::create("/", ".x.part").await;
        assert!(matches!(result, Err(Error::NoParent { .. })));
    }
}
