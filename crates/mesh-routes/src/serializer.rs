//! Route serializer — the single writer of the route tables.
//!
//! One task owns every table mutation. It takes three kinds of request,
//! one at a time:
//!   - recalculate: full rebuild. Coalesced through a one-slot channel, so
//!                  any number of requests made while one is pending cost a
//!                  single rebuild.
//!   - barrier:     reply once every recalculate requested so far has been
//!                  applied. A pending recalculate is drained first.
//!   - action:      run a closure against the engine, strictly ordered with
//!                  rebuilds. Used for lazy broadcast fills.
//!
//! The task stops once every request sender has been dropped.

use std::sync::Arc;

use mesh_core::config::RouterConfig;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::engine::Engine;

/// Work run on the serializer task.
pub(crate) type Action = Box<dyn FnOnce(&Engine) + Send>;

/// Sending half of the serializer's three request channels.
#[derive(Clone)]
pub(crate) struct Requests {
    recalculate: mpsc::Sender<()>,
    wait: mpsc::Sender<oneshot::Sender<()>>,
    action: mpsc::Sender<Action>,
}

impl Requests {
    /// Ask for a rebuild. Never blocks.
    pub(crate) fn recalculate(&self) {
        match self.recalculate.try_send(()) {
            // Full: a rebuild is already queued and will cover this request.
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => {
                tracing::warn!("route serializer stopped, recalculation dropped");
            }
        }
    }

    /// Wait until every rebuild requested before this call has completed.
    pub(crate) async fn barrier(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.wait.send(done_tx).await.is_err() {
            tracing::warn!("route serializer stopped, barrier not honoured");
            return;
        }
        let _ = done_rx.await;
    }

    /// Queue `action` behind everything already submitted. Returns false if
    /// the serializer is gone and the action was dropped.
    pub(crate) async fn submit(&self, action: Action) -> bool {
        if self.action.send(action).await.is_err() {
            tracing::warn!("route serializer stopped, action dropped");
            return false;
        }
        true
    }
}

/// Start the serializer task for `engine`. Must be called from within a
/// Tokio runtime.
pub(crate) fn spawn(engine: Arc<Engine>, config: &RouterConfig) -> Requests {
    let (recalculate_tx, recalculate_rx) = mpsc::channel(1);
    let (wait_tx, wait_rx) = mpsc::channel(config.barrier_queue_depth.max(1));
    let (action_tx, action_rx) = mpsc::channel(config.action_queue_depth.max(1));

    let serializer = Serializer {
        engine,
        recalculate: recalculate_rx,
        wait: wait_rx,
        action: action_rx,
    };
    tokio::spawn(serializer.run());

    Requests {
        recalculate: recalculate_tx,
        wait: wait_tx,
        action: action_tx,
    }
}

struct Serializer {
    engine: Arc<Engine>,
    recalculate: mpsc::Receiver<()>,
    wait: mpsc::Receiver<oneshot::Sender<()>>,
    action: mpsc::Receiver<Action>,
}

impl Serializer {
    async fn run(mut self) {
        tracing::debug!(peer = %self.engine.ourself.name(), "route serializer started");

        loop {
            tokio::select! {
                Some(()) = self.recalculate.recv() => {
                    self.engine.calculate();
                }

                Some(done) = self.wait.recv() => {
                    if self.recalculate.try_recv().is_ok() {
                        self.engine.calculate();
                    }
                    let _ = done.send(());
                }

                Some(action) = self.action.recv() => {
                    action(&self.engine);
                }

                else => break,
            }
        }

        tracing::debug!(peer = %self.engine.ourself.name(), "route serializer stopped");
    }
}
