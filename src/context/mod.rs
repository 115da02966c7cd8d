//! Per-request context: the parsed request, captured path parameters, and
//! the application state the router was built with.

use std::collections::HashMap;
use std::sync::Arc;

use crate::http::{FormData, Request};

/// Path parameters captured by a `:name` route segment.
#[derive(Default, Debug, Clone)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }
}

/// Everything a handler needs for one request.
///
/// `S` is the shared state handed to [`Router::new`](crate::router::Router::new);
/// it is how handlers reach the store and the task queue without globals.
pub struct Context<S> {
    request: Request,
    params: PathParams,
    state: Arc<S>,
}

impl<S> Context<S> {
    pub fn new(request: Request, state: Arc<S>) -> Self {
        Self::with_params(request, PathParams::new(), state)
    }

    pub fn with_params(request: Request, params: PathParams, state: Arc<S>) -> Self {
        Self {
            request,
            params,
            state,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Decoded form body of the request.
    pub fn form(&self) -> FormData {
        self.request.form()
    }
}
