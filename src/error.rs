//! Errors surfaced by a merge.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions that stop a merge.
///
/// Would-block reads and end-of-stream are part of normal operation and never
/// show up here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("cannot configure {} for non-blocking reads: {source}", .path.display())]
    Configure { path: PathBuf, source: io::Error },
    #[error("error reading {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("readiness poll failed: {0}")]
    Poll(#[source] io::Error),
    #[error("error writing output: {0}")]
    Write(#[source] io::Error),
    #[error("only {opened} of {requested} sources were opened before every opener exited")]
    Incomplete { opened: usize, requested: usize },
    #[error("merge cancelled")]
    Cancelled,
    #[error("multiplexer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Returns the source path this error is about, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Error::Open { path, .. } | Error::Configure { path, .. } | Error::Read { path, .. } => {
                Some(path.as_path())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_names_path() {
        let err = Error::Open {
            path: PathBuf::from("/no/such/pipe"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };

        assert_eq!(err.to_string(), "cannot open /no/such/pipe: not found");
        assert_eq!(err.path().unwrap(), std::path::Path::new("/no/such/pipe"));
        assert!(Error::Cancelled.path().is_none());
    }
}
