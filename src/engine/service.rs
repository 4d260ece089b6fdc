//! Engine task: a single consumer of inbound commands.
//!
//! Callers hold a cloneable [`EngineHandle`]; every command travels over
//! one mpsc queue to the task that owns the [`AcquisitionEngine`], so
//! surface mutations are totally ordered.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AcquisitionEngine, Command, Response};
use crate::surface::Surface;
use crate::types::EngineError;

type Envelope = (Command, oneshot::Sender<Response>);

#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Envelope>,
}

impl EngineHandle {
    /// Queue a command and wait for its response.
    pub async fn call(&self, command: Command) -> Result<Response, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((command, reply_tx))
            .await
            .map_err(|_| EngineError::EngineUnavailable)?;
        reply_rx.await.map_err(|_| EngineError::EngineUnavailable)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Move the engine onto its own task. The task ends once every handle
/// has been dropped.
pub fn spawn_engine<S>(engine: AcquisitionEngine<S>, queue: usize) -> (EngineHandle, JoinHandle<()>)
where
    S: Surface + 'static,
{
    let (tx, rx) = mpsc::channel(queue.max(1));
    let task = tokio::spawn(run(engine, rx));
    (EngineHandle { tx }, task)
}

async fn run<S: Surface>(mut engine: AcquisitionEngine<S>, mut rx: mpsc::Receiver<Envelope>) {
    info!(source = "engine", "Engine task started");
    while let Some((command, reply)) = rx.recv().await {
        debug!(source = "engine", command = command.name(), "Handling command");
        let response = engine.handle(command).await;
        if reply.send(response).is_err() {
            warn!(source = "engine", "Caller went away before the response was ready");
        }
    }
    info!(source = "engine", "Engine task stopped");
}
