//! Background worker that periodically retrains the model registry.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nuclearcast_core::{RetrainReport, ScenarioOrchestrator};

/// Request sent to the background worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRequest {
    /// Run a cycle now instead of waiting for the interval
    RetrainNow,
    /// Graceful shutdown
    Shutdown,
}

/// Response from the background worker, one per cycle
#[derive(Debug)]
pub enum WorkerResponse {
    Completed { cycle: usize, report: RetrainReport },
    Failed { cycle: usize, error: String },
}

/// Runs `retrain_all` once on start and then every `interval`
pub struct RetrainWorker {
    request_tx: Sender<WorkerRequest>,
    response_rx: Receiver<WorkerResponse>,
    thread: Option<JoinHandle<()>>,
}

impl RetrainWorker {
    pub fn spawn(orchestrator: Arc<ScenarioOrchestrator>, interval: Duration) -> Self {
        let (request_tx, request_rx) = channel();
        let (response_tx, response_rx) = channel();

        let ctx = WorkerContext {
            orchestrator,
            interval,
            response_tx,
        };

        let thread = match thread::Builder::new()
            .name("retrain-worker".to_string())
            .spawn(move || ctx.run(request_rx))
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "failed to start retrain worker");
                None
            }
        };

        Self {
            request_tx,
            response_rx,
            thread,
        }
    }

    pub fn retrain_now(&self) -> bool {
        self.request_tx.send(WorkerRequest::RetrainNow).is_ok()
    }

    pub fn try_recv(&self) -> Option<WorkerResponse> {
        self.response_rx.try_recv().ok()
    }

    /// Block until the next cycle finishes or the worker stops
    pub fn recv(&self) -> Option<WorkerResponse> {
        self.response_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerResponse> {
        self.response_rx.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        let _ = self.request_tx.send(WorkerRequest::Shutdown);
    }
}

impl Drop for RetrainWorker {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct WorkerContext {
    orchestrator: Arc<ScenarioOrchestrator>,
    interval: Duration,
    response_tx: Sender<WorkerResponse>,
}

impl WorkerContext {
    fn run(&self, request_rx: Receiver<WorkerRequest>) {
        let mut cycle = 0;
        loop {
            cycle += 1;
            if !self.run_cycle(cycle) {
                break;
            }

            match request_rx.recv_timeout(self.interval) {
                Ok(WorkerRequest::RetrainNow) | Err(RecvTimeoutError::Timeout) => continue,
                Ok(WorkerRequest::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::info!(cycles = cycle, "retrain worker stopped");
    }

    /// Returns false once nobody is listening for results
    fn run_cycle(&self, cycle: usize) -> bool {
        tracing::info!(cycle, "starting retrain cycle");
        let response = match self.orchestrator.retrain_all() {
            Ok(report) => WorkerResponse::Completed { cycle, report },
            Err(e) => {
                tracing::error!(cycle, error = %e, "retrain cycle failed");
                WorkerResponse::Failed {
                    cycle,
                    error: e.to_string(),
                }
            }
        };
        self.response_tx.send(response).is_ok()
    }
}
