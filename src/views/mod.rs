//! Request handlers for the to-do pages.
//!
//! | Route              | GET                   | POST                          |
//! |--------------------|-----------------------|-------------------------------|
//! | `/`                | list every item       |                               |
//! | `/create/`         | blank form            | queue a [`CreateTask`]        |
//! | `/update/:id/`     | form filled from item | queue an [`UpdateTask`]       |
//! | `/delete/:id/`     | queue a [`DeleteTask`] (any method)                   |
//!
//! Reads go straight to the store. Writes are handed to the task queue and
//! answered with a redirect to `/`; in [`DispatchMode::Deferred`] the
//! redirect does not wait for the worker, so the list may not show the change
//! yet.

mod forms;
pub mod templates;

use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub use forms::{CreateForm, UpdateForm};
pub use templates::Templates;

use crate::app::AppState;
use crate::background::{CreateTask, DeleteTask, QueueError, Task, TaskError};
use crate::config::DispatchMode;
use crate::context::{Context, PathParams};
use crate::http::{Response, StatusCode};
use crate::middleware::{Middleware, Next};
use crate::router::{IntoResponse, ResponseFuture};
use crate::store::{Item, ItemId, StoreError, blocking};

/// Where every successful mutation sends the browser.
pub const LIST_URL: &str = "/";

/// Errors a handler can end with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("no item id in path: {0:?}")]
    BadPath(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("template rendering failed: {0}")]
    Render(#[from] handlebars::RenderError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadPath(_) => StatusCode::NotFound,
            Self::Queue(_) => StatusCode::ServiceUnavailable,
            Self::Store(_) | Self::Task(_) | Self::Render(_) => StatusCode::InternalServerError,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match status {
            StatusCode::NotFound => Response::new(status).body("Not Found"),
            StatusCode::ServiceUnavailable => {
                error!(error = %self, "task queue rejected a mutation");
                Response::new(status).body("Service Unavailable")
            }
            // The body is filled in by ErrorPage.
            _ => {
                error!(error = %self, "request failed");
                Response::new(status)
            }
        }
    }
}

/// Fills empty `500` responses with the server error page.
pub struct ErrorPage {
    html: String,
}

impl ErrorPage {
    /// Pre-renders the page once.
    pub fn new(templates: &Templates) -> Result<Self, handlebars::RenderError> {
        let html = templates.render(templates::SERVER_ERROR, &())?;
        Ok(Self { html })
    }
}

impl<S: Send + Sync + 'static> Middleware<S> for ErrorPage {
    fn handle(&self, ctx: Context<S>, next: Next<S>) -> ResponseFuture {
        let html = self.html.clone();
        Box::pin(async move {
            let response = next.run(ctx).await;
            if response.status() == StatusCode::InternalServerError
                && response.body_bytes().is_empty()
            {
                let mut page = Response::html(html);
                page.set_status(StatusCode::InternalServerError);
                return page;
            }
            response
        })
    }
}

#[derive(Serialize)]
struct ListPage<'a> {
    todos: &'a [Item],
}

#[derive(Serialize)]
struct UpdatePage<'a> {
    todo: &'a Item,
}

fn item_id(params: &PathParams) -> Result<ItemId, AppError> {
    let raw = params.get("id").unwrap_or_default();
    raw.parse().map_err(|_| AppError::BadPath(raw.to_owned()))
}

fn page<T: Serialize>(state: &AppState, name: &str, data: &T) -> Result<Response, AppError> {
    Ok(Response::html(state.templates.render(name, data)?))
}

async fn load(state: &AppState, id: ItemId) -> Result<Item, AppError> {
    Ok(blocking(&state.store, move |s| s.get(id)).await?)
}

/// Queues `task` and redirects to the list.
///
/// Deferred dispatch drops the ticket; blocking dispatch waits for the worker
/// and surfaces the task's failure.
async fn dispatch(state: &AppState, task: impl Into<Task>) -> Result<Response, AppError> {
    let ticket = state.queue.submit(task)?;
    match state.dispatch {
        DispatchMode::Deferred => drop(ticket),
        DispatchMode::Blocking => {
            ticket.wait().await?;
        }
    }
    Ok(Response::redirect(LIST_URL))
}

/// `GET /`
pub async fn list_items(ctx: Context<AppState>) -> Result<Response, AppError> {
    let state = ctx.state();
    let items = blocking(&state.store, |s| s.list()).await?;
    page(state, templates::TODO_LIST, &ListPage { todos: &items })
}

/// `GET /create/`
pub async fn create_form(ctx: Context<AppState>) -> Result<Response, AppError> {
    page(ctx.state(), templates::CREATE_TODO, &())
}

/// `POST /create/`
pub async fn create_item(ctx: Context<AppState>) -> Result<Response, AppError> {
    let form = CreateForm::from_form(&ctx.form());
    dispatch(ctx.state(), CreateTask::from(form)).await
}

/// `GET /update/:id/`
pub async fn update_form(ctx: Context<AppState>) -> Result<Response, AppError> {
    let id = item_id(ctx.params())?;
    let state = ctx.state();
    let item = load(state, id).await?;
    page(state, templates::UPDATE_TODO, &UpdatePage { todo: &item })
}

/// `POST /update/:id/`
///
/// The item is loaded before anything is queued, so a missing id fails here
/// rather than in the worker.
pub async fn update_item(ctx: Context<AppState>) -> Result<Response, AppError> {
    let id = item_id(ctx.params())?;
    let state = ctx.state();
    load(state, id).await?;
    let form = UpdateForm::from_form(&ctx.form());
    dispatch(state, form.into_task(id)).await
}

/// `* /delete/:id/`
///
/// Existence is not checked; deleting a missing id fails inside the task.
pub async fn delete_item(ctx: Context<AppState>) -> Result<Response, AppError> {
    let id = item_id(ctx.params())?;
    dispatch(ctx.state(), DeleteTask { id }).await
}
