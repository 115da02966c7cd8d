//! Background tasks: deferred item mutations, the in-process queue that
//! carries them, and the worker pool that executes them.
//!
//! Delivery is best effort. A task is lost if the process exits before a
//! worker picks it up, and nothing is retried.

pub mod queue;
pub mod task;
pub mod worker;

pub use queue::{QueueError, TaskError, TaskId, TaskQueue, TaskReceiver, TaskResult, TaskTicket};
pub use task::{CreateTask, DeleteTask, Mutation, Task, TaskOutput, UpdateTask};
pub use worker::{TaskReport, Worker};
