//! Wiring openers and the multiplexer together for a set of paths.

use std::io::Write;
use std::path::PathBuf;

use futures_util::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::handoff;
use crate::mux::{MergeStats, Multiplexer};
use crate::poll::PollReadiness;
use crate::source::{open_source, SourceId};
use crate::{Error, MuxConfig};

/// Merges files and named pipes into one output without splitting lines.
///
/// Each path gets its own opener task, so a FIFO with no writer yet only
/// delays itself. Lines from different sources may interleave in any order;
/// bytes from one source keep their order.
#[derive(Debug, Default)]
pub struct LineMerge {
    paths: Vec<PathBuf>,
    config: MuxConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl LineMerge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source. The same path may be added more than once; each
    /// addition is read independently.
    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.paths.push(path.into());
        self
    }

    pub fn with_config(&mut self, config: MuxConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Cancels the merge once `shutdown` turns `true`.
    pub fn with_shutdown(&mut self, shutdown: watch::Receiver<bool>) -> &mut Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Returns the paths that will be read, in the order added.
    pub fn paths(&self) -> &[PathBuf] {
        self.paths.as_slice()
    }

    /// Copies every source to `output` and returns once all have reached
    /// end-of-stream. The added paths are consumed.
    ///
    /// Must be called from within a tokio runtime. On error the
    /// openers are aborted, but any still blocked opening a FIFO keep a
    /// blocking-pool thread until a writer shows up; callers that want to stop
    /// immediately should exit the process.
    pub async fn run<W>(&mut self, output: W) -> Result<MergeStats, Error>
    where
        W: Write + Send + 'static,
    {
        let paths = std::mem::take(&mut self.paths);
        let requested = paths.len();
        if requested == 0 {
            return Ok(MergeStats::default());
        }

        let (tx, rx) = handoff::channel();
        let openers: Vec<_> = paths
            .into_iter()
            .enumerate()
            .map(|(idx, path)| {
                tokio::spawn(open_source(SourceId::new(idx as u64), path, tx.clone()))
            })
            .collect();
        // Openers hold the only senders now, so the multiplexer sees the
        // queue close if they all exit early.
        drop(tx);

        let mut mux = Multiplexer::new(
            PollReadiness::new(),
            output,
            requested,
            self.config,
            Handle::current(),
        );
        if let Some(shutdown) = self.shutdown.clone() {
            mux = mux.with_shutdown(shutdown);
        }

        let res = match tokio::task::spawn_blocking(move || mux.run(rx)).await {
            Ok(res) => res,
            Err(e) => Err(Error::from(e)),
        };

        match res {
            Ok(stats) => {
                // Every source was acknowledged, so openers are finishing.
                for joined in join_all(openers).await {
                    joined?;
                }
                debug!(sources = stats.sources, "openers joined");
                Ok(stats)
            }
            Err(e) => {
                for opener in &openers {
                    opener.abort();
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_kept_in_order() {
        let mut merge = LineMerge::new();
        merge.add_path("/a").add_path("/b").add_path("/a");

        assert_eq!(
            merge.paths(),
            &[
                PathBuf::from("/a"),
                PathBuf::from("/b"),
                PathBuf::from("/a")
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_without_paths() {
        let stats = LineMerge::new().run(Vec::new()).await.unwrap();

        assert_eq!(stats, MergeStats::default());
    }
}
