//! The multiplexer: a single loop that admits opened sources, polls them and
//! flushes whole lines to the output.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::handoff::{HandoffMsg, HandoffReceiver};
use crate::output::OutputWriter;
use crate::poll::{ReadOutcome, Readiness};
use crate::source::{SourceId, SourceState};
use crate::{Error, MuxConfig};

/// Summary of a finished merge.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MergeStats {
    /// Sources read to end-of-stream.
    pub sources: usize,
    /// Bytes written to the output.
    pub bytes: u64,
    /// Write calls made on the output.
    pub flushes: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LoopState {
    AwaitingFirstSource,
    Draining,
    Complete,
}

/// A source owned by the multiplexer.
struct ActiveSource<H> {
    id: SourceId,
    path: PathBuf,
    handle: H,
    /// Bytes read since the last flush. Never contains a newline.
    partial: Vec<u8>,
}

/// Merges every handed-off source into one output, flushing only whole lines
/// (or a source's final fragment at end-of-stream).
///
/// The loop blocks in only three places: waiting for the first source, the
/// bounded readiness poll, and waiting for another source when none are
/// active. It is meant to run on a thread of its own, such as one from
/// [`tokio::task::spawn_blocking`].
pub struct Multiplexer<R: Readiness, W> {
    readiness: R,
    output: OutputWriter<W>,
    config: MuxConfig,
    requested: usize,
    opened: usize,
    closed: usize,
    states: Vec<SourceState>,
    active: Vec<ActiveSource<R::Handle>>,
    loop_state: LoopState,
    runtime: Handle,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<R: Readiness, W: Write> Multiplexer<R, W> {
    /// Creates a multiplexer expecting `requested` sources, with ids
    /// `0..requested`.
    ///
    /// `runtime` is used to wait on the handoff queue from this thread.
    pub fn new(
        readiness: R,
        output: W,
        requested: usize,
        config: MuxConfig,
        runtime: Handle,
    ) -> Self {
        Multiplexer {
            readiness,
            output: OutputWriter::new(output),
            config,
            requested,
            opened: 0,
            closed: 0,
            states: vec![SourceState::PendingOpen; requested],
            active: Vec::new(),
            loop_state: LoopState::AwaitingFirstSource,
            runtime,
            shutdown: None,
        }
    }

    /// Stops the loop once `shutdown` turns `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Runs until every requested source is closed.
    pub fn run(mut self, mut handoffs: HandoffReceiver<R::Handle>) -> Result<MergeStats, Error> {
        let mut buf = vec![0u8; self.config.chunk_size().max(1)];

        while self.closed < self.requested {
            self.check_shutdown()?;
            self.drain_handoffs(&mut handoffs)?;

            if self.active.is_empty() {
                self.wait_for_handoff(&mut handoffs)?;
                continue;
            }
            self.set_loop_state(LoopState::Draining);

            let ready = self.poll_active()?;

            // Highest index first, so removing a closed source leaves the
            // remaining indices valid.
            for idx in ready.into_iter().rev() {
                if self.service(idx, &mut buf)? {
                    self.drain_handoffs(&mut handoffs)?;
                }
            }
        }

        self.set_loop_state(LoopState::Complete);

        let stats = MergeStats {
            sources: self.closed,
            bytes: self.output.bytes(),
            flushes: self.output.flushes(),
        };
        info!(
            sources = stats.sources,
            bytes = stats.bytes,
            flushes = stats.flushes,
            "all sources closed"
        );

        Ok(stats)
    }

    fn set_loop_state(&mut self, state: LoopState) {
        if self.loop_state != state {
            debug!(from = ?self.loop_state, to = ?state, "multiplexer state");
            self.loop_state = state;
        }
    }

    fn check_shutdown(&mut self) -> Result<(), Error> {
        let stop = self
            .shutdown
            .as_ref()
            .map_or(false, |shutdown| *shutdown.borrow());

        if stop {
            Err(self.cancel())
        } else {
            Ok(())
        }
    }

    fn cancel(&mut self) -> Error {
        let discarded: usize = self.active.iter().map(|source| source.partial.len()).sum();
        if discarded > 0 {
            warn!(
                bytes = discarded,
                "cancelled with unterminated lines; discarding them"
            );
        }
        self.active.clear();

        Error::Cancelled
    }

    /// Admits every handoff already queued, without waiting.
    fn drain_handoffs(&mut self, handoffs: &mut HandoffReceiver<R::Handle>) -> Result<(), Error> {
        while let Ok(msg) = handoffs.try_recv() {
            self.admit(msg)?;
        }

        Ok(())
    }

    /// Blocks until one more source is handed off, or the merge can't go on.
    fn wait_for_handoff(
        &mut self,
        handoffs: &mut HandoffReceiver<R::Handle>,
    ) -> Result<(), Error> {
        debug!(
            outstanding = self.requested - self.opened,
            "no active sources, waiting for one to open"
        );

        let shutdown = self.shutdown.as_mut();
        let received = self.runtime.block_on(async move {
            tokio::select! {
                msg = handoffs.recv() => Some(msg),
                _ = cancelled(shutdown) => None,
            }
        });

        match received {
            Some(Some(msg)) => self.admit(msg),
            Some(None) => Err(Error::Incomplete {
                opened: self.opened,
                requested: self.requested,
            }),
            None => Err(self.cancel()),
        }
    }

    fn admit(&mut self, msg: HandoffMsg<R::Handle>) -> Result<(), Error> {
        let handoff = match msg {
            HandoffMsg::Opened(handoff) => handoff,
            HandoffMsg::Failed(e) => return Err(e),
        };
        let (id, path, handle, acker) = handoff.into_parts();

        let state = match self.states.get_mut(id.index()) {
            Some(state) if *state == SourceState::PendingOpen => state,
            other => {
                warn!(%id, state = ?other, "ignoring handoff for unexpected source");
                acker.acknowledge();
                return Ok(());
            }
        };
        *state = SourceState::OpenedUnacknowledged;

        self.active.push(ActiveSource {
            id,
            path,
            handle,
            partial: Vec::new(),
        });
        acker.acknowledge();

        *state = SourceState::Active;
        self.opened += 1;

        debug!(
            %id,
            active = self.active.len(),
            opened = self.opened,
            requested = self.requested,
            "source admitted"
        );

        Ok(())
    }

    fn poll_active(&mut self) -> Result<Vec<usize>, Error> {
        let handles: Vec<&R::Handle> = self.active.iter().map(|source| &source.handle).collect();

        self.readiness
            .poll(&handles, self.config.poll_interval())
            .map_err(Error::Poll)
    }

    /// Reads once from the active source at `idx`. Returns `true` if it
    /// closed.
    fn service(&mut self, idx: usize, buf: &mut [u8]) -> Result<bool, Error> {
        let source = &mut self.active[idx];

        let outcome = self
            .readiness
            .try_read(&mut source.handle, buf)
            .map_err(|e| Error::Read {
                path: source.path.clone(),
                source: e,
            })?;

        match outcome {
            ReadOutcome::WouldBlock => Ok(false),
            ReadOutcome::Closed => {
                self.close(idx)?;
                Ok(true)
            }
            ReadOutcome::Data(n) => {
                let chunk = &buf[..n];

                match chunk.iter().rposition(|&b| b == b'\n') {
                    Some(pos) => {
                        let (complete, rest) = chunk.split_at(pos + 1);
                        self.output
                            .emit(&source.partial, complete)
                            .map_err(Error::Write)?;
                        trace!(
                            id = %source.id,
                            bytes = source.partial.len() + complete.len(),
                            "flushed lines"
                        );
                        source.partial.clear();
                        source.partial.extend_from_slice(rest);
                    }
                    None => source.partial.extend_from_slice(chunk),
                }

                Ok(false)
            }
        }
    }

    fn close(&mut self, idx: usize) -> Result<(), Error> {
        let source = self.active.remove(idx);

        self.output
            .emit(&source.partial, &[])
            .map_err(Error::Write)?;

        self.states[source.id.index()] = SourceState::Closed;
        self.closed += 1;

        debug!(
            id = %source.id,
            path = %source.path.display(),
            trailing = source.partial.len(),
            closed = self.closed,
            requested = self.requested,
            "source closed"
        );

        Ok(())
    }
}

impl<R: Readiness, W> fmt::Debug for Multiplexer<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.debug_struct("Multiplexer")
            .field("loop_state", &self.loop_state)
            .field("requested", &self.requested)
            .field("opened", &self.opened)
            .field("closed", &self.closed)
            .field("states", &self.states)
            .field("output", &self.output)
            .finish()
    }
}

/// Resolves once `shutdown` reads `true`; never, if there is no signal or its
/// sender is gone.
async fn cancelled(shutdown: Option<&mut watch::Receiver<bool>>) {
    match shutdown {
        Some(shutdown) => {
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}
