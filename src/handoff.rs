//! Channels that carry opened sources from their openers to the multiplexer,
//! and acknowledgments back.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};

pub use tokio::sync::mpsc::error::TryRecvError;

use crate::source::SourceId;
use crate::Error;

/// An opened source on its way to the multiplexer.
///
/// The handle is moved in here by the opener and moved out by the
/// multiplexer, which then answers on `ack` with the same id.
pub struct Handoff<H> {
    pub(crate) id: SourceId,
    pub(crate) path: PathBuf,
    pub(crate) handle: H,
    pub(crate) ack: oneshot::Sender<SourceId>,
}

impl<H> Handoff<H> {
    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn path(&self) -> &std::path::Path {
        self.path.as_path()
    }

    /// Splits the record, leaving the caller responsible for acknowledging.
    pub(crate) fn into_parts(self) -> (SourceId, PathBuf, H, Acknowledger) {
        let Handoff {
            id,
            path,
            handle,
            ack,
        } = self;

        (id, path, handle, Acknowledger { id, tx: ack })
    }
}

impl<H> fmt::Debug for Handoff<H> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.debug_struct("Handoff")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

/// Reply half of a handoff, consumed exactly once.
#[derive(Debug)]
pub(crate) struct Acknowledger {
    id: SourceId,
    tx: oneshot::Sender<SourceId>,
}

impl Acknowledger {
    pub(crate) fn acknowledge(self) {
        // The opener may have been aborted already; ownership has moved
        // either way.
        let _ = self.tx.send(self.id);
    }
}

/// Message published by an opener.
#[derive(Debug)]
pub enum HandoffMsg<H> {
    Opened(Handoff<H>),
    Failed(Error),
}

/// Producer side, cloned into each opener.
pub struct HandoffSender<H> {
    tx: mpsc::UnboundedSender<HandoffMsg<H>>,
}

impl<H> Clone for HandoffSender<H> {
    fn clone(&self) -> Self {
        HandoffSender {
            tx: self.tx.clone(),
        }
    }
}

impl<H> HandoffSender<H> {
    /// Queues `handle` for the multiplexer and returns the receiver on which
    /// its acknowledgment will arrive.
    ///
    /// Returns `None` if the multiplexer is gone, in which case the handle is
    /// dropped here.
    pub fn hand_off(
        &self,
        id: SourceId,
        path: PathBuf,
        handle: H,
    ) -> Option<oneshot::Receiver<SourceId>> {
        let (ack, ack_rx) = oneshot::channel();
        let handoff = Handoff {
            id,
            path,
            handle,
            ack,
        };

        self.tx.send(HandoffMsg::Opened(handoff)).ok()?;

        Some(ack_rx)
    }

    /// Reports that a source could not be made available.
    pub fn fail(&self, err: Error) {
        let _ = self.tx.send(HandoffMsg::Failed(err));
    }
}

/// Consumer side, owned by the multiplexer.
pub struct HandoffReceiver<H> {
    rx: mpsc::UnboundedReceiver<HandoffMsg<H>>,
}

impl<H> HandoffReceiver<H> {
    /// Returns a queued message without waiting.
    pub fn try_recv(&mut self) -> Result<HandoffMsg<H>, TryRecvError> {
        self.rx.try_recv()
    }

    /// Waits for the next message, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<HandoffMsg<H>> {
        self.rx.recv().await
    }
}

/// Creates an unbounded handoff queue.
pub fn channel<H>() -> (HandoffSender<H>, HandoffReceiver<H>) {
    let (tx, rx) = mpsc::unbounded_channel();

    (HandoffSender { tx }, HandoffReceiver { rx })
}
