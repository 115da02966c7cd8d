//! Application wiring: shared state, the route table, and process startup.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::background::{TaskQueue, Worker};
use crate::config::{Config, DispatchMode, StoreLocation};
use crate::middleware::LoggerMiddleware;
use crate::router::Router;
use crate::server::{Server, ServerError};
use crate::store::{SharedStore, SqliteItemStore, StoreError};
use crate::views::{self, ErrorPage, Templates};

/// How long shutdown waits for queued tasks to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open item store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to compile templates: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("failed to render error page: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// State shared by every request handler.
pub struct AppState {
    pub store: SharedStore,
    pub queue: TaskQueue,
    pub dispatch: DispatchMode,
    pub templates: Templates,
}

impl AppState {
    pub fn new(
        store: SharedStore,
        queue: TaskQueue,
        dispatch: DispatchMode,
    ) -> Result<Self, handlebars::TemplateError> {
        Ok(Self {
            store,
            queue,
            dispatch,
            templates: Templates::new()?,
        })
    }
}

/// Builds the route table over `state`.
pub fn router(state: Arc<AppState>) -> Result<Router<AppState>, handlebars::RenderError> {
    let error_page = ErrorPage::new(&state.templates)?;
    let mut router = Router::new(state);
    router.layer(LoggerMiddleware);
    router.layer(error_page);

    router.get("/", views::list_items);
    router.get("/create/", views::create_form);
    router.post("/create/", views::create_item);
    router.get("/update/:id/", views::update_form);
    router.post("/update/:id/", views::update_item);
    router.any("/delete/:id/", views::delete_item);
    Ok(router)
}

fn open_store(config: &Config) -> Result<SharedStore, StoreError> {
    Ok(match config.store_location() {
        StoreLocation::InMemory => Arc::new(SqliteItemStore::open_in_memory()?),
        StoreLocation::File(path) => Arc::new(SqliteItemStore::open(path)?),
    })
}

/// Runs the server and its worker pool until Ctrl-C.
///
/// On shutdown the listener closes first, then the worker is given
/// [`DRAIN_TIMEOUT`] to finish what is already queued.
pub async fn run(config: Config) -> Result<(), StartupError> {
    let store = open_store(&config)?;
    let (queue, receiver) = TaskQueue::new(config.queue_capacity.get());
    let worker = tokio::spawn(Worker::new(receiver, Arc::clone(&store), config.workers).run());

    let state = Arc::new(AppState::new(store, queue, config.dispatch)?);
    let router = router(state)?;
    let server = Server::bind(&config.addr).await?;
    info!(
        address = %server.local_addr(),
        dispatch = %config.dispatch,
        workers = config.workers.get(),
        queue_capacity = config.queue_capacity.get(),
        "todoq started"
    );

    server.serve(router, shutdown_signal()).await?;

    // Idle keep-alive connections can keep the queue open, so the wait is bounded.
    match tokio::time::timeout(DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => info!("task queue drained"),
        Ok(Err(err)) => error!(error = %err, "worker task failed"),
        Err(_) => warn!(
            timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "gave up waiting for queued tasks"
        ),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}
