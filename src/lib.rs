//! # todoq
//!
//! A to-do list served as plain HTML forms. Reads hit the item store
//! directly; creates, updates and deletes are queued as background tasks
//! and applied by a worker pool.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clap::Parser;
//! use todoq::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = Config::parse_from(["todoq", "--database", ":memory:"]);
//!     todoq::logging::init(config.log_level)?;
//!     todoq::app::run(config).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod background;
pub mod config;
pub mod context;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod server;
pub mod store;
pub mod views;

pub use app::{AppState, StartupError};
pub use background::{Task, TaskQueue, Worker};
pub use config::{Config, DispatchMode};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
pub use store::{Item, ItemId, ItemStore, SqliteItemStore, StoreError};
