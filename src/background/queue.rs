//! In-process task queue over a bounded tokio channel.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::task::{Task, TaskOutput};
use crate::store::StoreError;

/// Identifier of a submitted task, unique within its [`TaskQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Errors from submitting a task.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("task queue is full")]
    Full,

    #[error("task queue is closed")]
    Closed,
}

/// Errors from executing a task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("worker dropped the task before reporting a result")]
    Abandoned,
}

impl TaskError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_not_found())
    }
}

pub type TaskResult = Result<TaskOutput, TaskError>;

/// A queued task plus the channel its result is reported on.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub(crate) id: TaskId,
    pub(crate) task: Task,
    pub(crate) reply: oneshot::Sender<TaskResult>,
}

/// Receipt for a submitted task.
///
/// Dropping the ticket is the fire-and-forget path; the task still runs.
#[derive(Debug)]
#[must_use = "drop the ticket explicitly to fire and forget"]
pub struct TaskTicket {
    id: TaskId,
    reply: oneshot::Receiver<TaskResult>,
}

impl TaskTicket {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Waits until a worker has executed the task.
    ///
    /// # Errors
    ///
    /// The task's own failure, or [`TaskError::Abandoned`] if the worker went
    /// away without running it.
    pub async fn wait(self) -> TaskResult {
        self.reply.await.unwrap_or(Err(TaskError::Abandoned))
    }
}

/// Cloneable submission handle. Clones share one id sequence.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<Envelope>,
    next_id: Arc<AtomicU64>,
}

/// Receiving half, owned by a [`Worker`](super::Worker).
#[derive(Debug)]
pub struct TaskReceiver {
    inner: mpsc::Receiver<Envelope>,
}

impl TaskReceiver {
    pub(crate) async fn recv(&mut self) -> Option<Envelope> {
        self.inner.recv().await
    }
}

impl TaskQueue {
    /// Creates a queue holding at most `capacity` pending tasks.
    ///
    /// # Panics
    ///
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> (Self, TaskReceiver) {
        let (sender, inner) = mpsc::channel(capacity);
        let queue = Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        (queue, TaskReceiver { inner })
    }

    /// Enqueues `task` without waiting for room or for execution.
    ///
    /// # Errors
    ///
    /// [`QueueError::Full`] at capacity, [`QueueError::Closed`] once the
    /// receiver is gone.
    pub fn submit(&self, task: impl Into<Task>) -> Result<TaskTicket, QueueError> {
        let task = task.into();
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = task.name();
        let (reply, receiver) = oneshot::channel();

        self.sender
            .try_send(Envelope { id, task, reply })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            })?;

        debug!(task_id = %id, task = name, "task submitted");
        Ok(TaskTicket {
            id,
            reply: receiver,
        })
    }

    /// Number of tasks waiting to be picked up.
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}
