use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create directory {}", path.display())]
    CreateDir {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move {} to {}", from.display(), to.display())]
    Rename {
        from:   PathBuf,
        to:     PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove {}", path.display())]
    Remove {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path has no parent directory: {}", path.display())]
    NoParent { path: PathBuf },
}

impl Error {
    /// The path the failed operation was acting on.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Error::CreateDir { path, .. }
            | Error::Write { path, .. }
            | Error::Remove { path, .. }
            | Error::NoParent { path } => path,
            Error::Rename { to, .. } => to,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
