//! Command-line and environment configuration.

use std::fmt;
use std::num::NonZeroUsize;

use clap::{Parser, ValueEnum};
use tracing::Level;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_DATABASE: &str = "todoq.sqlite3";

/// Database path that selects a private in-memory store.
pub const IN_MEMORY: &str = ":memory:";

/// How handlers hand mutations to the task queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DispatchMode {
    /// Redirect as soon as the task is queued.
    #[default]
    Deferred,
    /// Redirect only after the worker has applied the task.
    Blocking,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deferred => "deferred",
            Self::Blocking => "blocking",
        })
    }
}

/// Where items are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation<'a> {
    InMemory,
    File(&'a str),
}

/// A web to-do list whose edits run on a background task queue.
#[derive(Parser, Debug, Clone)]
#[command(name = "todoq", version, about)]
pub struct Config {
    /// Address to listen on.
    #[arg(short, long, env = "TODOQ_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// SQLite database file, or `:memory:`.
    #[arg(long, env = "TODOQ_DATABASE", default_value = DEFAULT_DATABASE)]
    pub database: String,

    /// Whether form submissions wait for their task to finish.
    #[arg(long, env = "TODOQ_DISPATCH", value_enum, default_value_t = DispatchMode::Deferred)]
    pub dispatch: DispatchMode,

    /// Maximum number of tasks executed concurrently.
    #[arg(long, env = "TODOQ_WORKERS", default_value = "4")]
    pub workers: NonZeroUsize,

    /// Maximum number of tasks waiting in the queue.
    #[arg(long, env = "TODOQ_QUEUE_CAPACITY", default_value = "1024")]
    pub queue_capacity: NonZeroUsize,

    /// Default log level when RUST_LOG is not set.
    #[arg(long, env = "TODOQ_LOG_LEVEL", default_value = "info")]
    pub log_level: Level,
}

impl Config {
    pub fn store_location(&self) -> StoreLocation<'_> {
        if self.database == IN_MEMORY {
            StoreLocation::InMemory
        } else {
            StoreLocation::File(&self.database)
        }
    }
}
