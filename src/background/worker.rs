//! Worker pool that executes queued tasks against the item store.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::queue::{Envelope, TaskError, TaskId, TaskReceiver};
use crate::store::{SharedStore, blocking};

/// Summary of one executed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub id: TaskId,
    pub name: &'static str,
    pub succeeded: bool,
    /// Output message on success, error text on failure.
    pub detail: String,
}

/// Drains a [`TaskReceiver`], applying each task to the store.
///
/// Task failures are logged and reported back to any waiting ticket; they
/// never stop the worker.
pub struct Worker {
    receiver: TaskReceiver,
    store: SharedStore,
    concurrency: NonZeroUsize,
}

impl Worker {
    pub fn new(receiver: TaskReceiver, store: SharedStore, concurrency: NonZeroUsize) -> Self {
        Self {
            receiver,
            store,
            concurrency,
        }
    }

    /// Executes the next queued task inline.
    ///
    /// Returns `None` once every [`TaskQueue`](super::TaskQueue) handle has
    /// been dropped and the queue is empty.
    pub async fn run_once(&mut self) -> Option<TaskReport> {
        let envelope = self.receiver.recv().await?;
        Some(execute(&self.store, envelope).await)
    }

    /// Runs until the queue closes, executing up to `concurrency` tasks at
    /// a time, then waits for in-flight tasks to finish.
    pub async fn run(mut self) {
        let permits = Arc::new(Semaphore::new(self.concurrency.get()));
        let mut in_flight = JoinSet::new();
        info!(concurrency = self.concurrency.get(), "worker started");

        while let Some(envelope) = self.receiver.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let store = Arc::clone(&self.store);
            in_flight.spawn(async move {
                let report = execute(&store, envelope).await;
                drop(permit);
                report
            });

            while let Some(joined) = in_flight.try_join_next() {
                reap(joined);
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            reap(joined);
        }
        info!("worker stopped");
    }
}

fn reap(joined: Result<TaskReport, tokio::task::JoinError>) {
    if let Err(err) = joined {
        warn!(error = %err, "task execution panicked");
    }
}

async fn execute(store: &SharedStore, envelope: Envelope) -> TaskReport {
    let Envelope { id, task, reply } = envelope;
    let name = task.name();
    debug!(task_id = %id, task = name, "task started");

    let result = blocking(store, move |s| task.apply(s))
        .await
        .map_err(TaskError::from);

    let report = match &result {
        Ok(output) => {
            let detail = output.message();
            info!(task_id = %id, task = name, "{detail}");
            TaskReport {
                id,
                name,
                succeeded: true,
                detail,
            }
        }
        Err(err) => {
            error!(task_id = %id, task = name, error = %err, "task failed");
            TaskReport {
                id,
                name,
                succeeded: false,
                detail: err.to_string(),
            }
        }
    };

    // Nobody listens when the submitter fired and forgot.
    let _ = reply.send(result);
    report
}
