//! Best-effort background execution for side effects that must not hold up a
//! response: audit writes, email delivery and report generation.
//!
//! Jobs live only in memory. A crash or shutdown drops whatever is queued.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

type BoxedJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct Job {
    label: &'static str,
    future: BoxedJob,
}

#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl TaskQueue {
    /// Create the queue and spawn `worker_count` workers on the current runtime.
    pub fn start(worker_count: usize, shutdown: watch::Receiver<bool>) -> (Self, Vec<JoinHandle<()>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..worker_count.max(1))
            .map(|id| tokio::spawn(run(id, receiver.clone(), shutdown.clone())))
            .collect();

        tracing::info!("Background task queue started ({worker_count} workers)");

        (Self { sender }, handles)
    }

    /// Hand a job to the workers. Never blocks and never fails the caller.
    pub fn submit<F>(&self, label: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let job = Job {
            label,
            future: Box::pin(future),
        };
        if self.sender.send(job).is_err() {
            tracing::warn!("Task queue closed, dropping {label} job");
        }
    }
}

async fn run(
    id: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!("Worker {id} started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let job = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                job = receiver.recv() => job,
                _ = shutdown.changed() => None,
            }
        };

        let Some(job) = job else {
            break;
        };

        // Run each job in its own task so a panic only loses that job
        let label = job.label;
        match tokio::spawn(job.future).await {
            Ok(()) => tracing::debug!("Worker {id} finished {label} job"),
            Err(e) => tracing::error!("Worker {id} {label} job panicked: {e}"),
        }
    }

    tracing::debug!("Worker {id} stopped");
}
