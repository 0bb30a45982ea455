//! Opening sources, one task per requested path.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tracing::debug;

use crate::handoff::HandoffSender;
use crate::poll::NonBlockingFile;
use crate::Error;

/// Identifies one requested source for the lifetime of a merge.
///
/// Ids come from the position of the path in the request, so two sources
/// never share one even if the platform reuses descriptors.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SourceId(u64);

impl SourceId {
    pub fn new(id: u64) -> Self {
        SourceId(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a source is in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SourceState {
    /// The opener's `open` has not returned yet.
    PendingOpen,
    /// Queued for the multiplexer, not yet claimed.
    OpenedUnacknowledged,
    /// Registered in the multiplexer's poll set.
    Active,
    /// End-of-stream seen and the remaining buffer flushed.
    Closed,
}

impl Default for SourceState {
    fn default() -> Self {
        SourceState::PendingOpen
    }
}

/// Opens `path` for non-blocking reads.
///
/// Opening a FIFO blocks until a writer connects; that wait happens on the
/// runtime's blocking pool and only holds up this source.
async fn open_nonblocking(path: &Path) -> Result<NonBlockingFile, Error> {
    let file = File::open(path).await.map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let file = file.into_std().await;

    NonBlockingFile::new(file).map_err(|source| Error::Configure {
        path: path.to_path_buf(),
        source,
    })
}

/// Opens one source and hands it to the multiplexer, returning once the
/// multiplexer has acknowledged taking it.
///
/// Failures are reported over `handoffs` rather than returned, since the
/// multiplexer decides how the whole merge ends.
pub async fn open_source(id: SourceId, path: PathBuf, handoffs: HandoffSender<NonBlockingFile>) {
    debug!(%id, path = %path.display(), "opening source");

    let handle = match open_nonblocking(&path).await {
        Ok(handle) => handle,
        Err(e) => {
            debug!(%id, error = %e, "source failed to open");
            handoffs.fail(e);
            return;
        }
    };

    debug!(%id, path = %path.display(), "source opened");

    let ack = match handoffs.hand_off(id, path, handle) {
        Some(ack) => ack,
        None => {
            debug!(%id, "multiplexer gone before handoff");
            return;
        }
    };

    match ack.await {
        Ok(acked) => {
            debug_assert_eq!(acked, id);
            debug!(%id, "handoff acknowledged");
        }
        Err(_) => debug!(%id, "multiplexer gone before acknowledging"),
    }
}
