//! Request routing: map URL patterns and HTTP methods to handler functions.
//!
//! | Pattern          | Example match           | Captured params                  |
//! |------------------|-------------------------|----------------------------------|
//! | `/create/`       | `/create`               | *(none)*                         |
//! | `/update/:id/`   | `/update/42/`           | `id → "42"`                      |
//!
//! Trailing slashes are normalized on both patterns and incoming paths.
//! Routes are matched in registration order and the first route whose method
//! and pattern both match wins. Every request, matched or not, passes through
//! the router's middleware stack.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::http::{Method, Request, Response, StatusCode};
use crate::middleware::{Middleware, MiddlewareHandler, Next, from_middleware};

/// The boxed future every handler and middleware resolves through.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Type-erased async handler stored by the router.
pub type Handler<S> = Arc<dyn Fn(Context<S>) -> ResponseFuture + Send + Sync>;

/// Conversion of a handler's return value into a [`Response`].
///
/// Implemented for [`Response`] itself and for `Result<T, E>` where both
/// sides convert, so handlers can use `?` on their own error type.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl<T, E> IntoResponse for Result<T, E>
where
    T: IntoResponse,
    E: IntoResponse,
{
    fn into_response(self) -> Response {
        match self {
            Ok(value) => value.into_response(),
            Err(err) => err.into_response(),
        }
    }
}

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context<S>) -> impl Future<Output = impl IntoResponse>` that is
/// `Send + Sync + 'static` implements this through the blanket impl.
pub trait IntoHandler<S>: Send + Sync + 'static {
    fn call(&self, ctx: Context<S>) -> ResponseFuture;
}

impl<S, T, F, R> IntoHandler<S> for T
where
    S: Send + Sync + 'static,
    T: Fn(Context<S>) -> F + Send + Sync + 'static,
    F: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, ctx: Context<S>) -> ResponseFuture {
        let future = (self)(ctx);
        Box::pin(async move { future.await.into_response() })
    }
}

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

impl Pattern {
    /// Compiles a pattern string.
    ///
    /// Contains `:` → parameterized; otherwise exact.
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Parameter(name.to_owned()),
                    None => Segment::Static(s.to_owned()),
                })
                .collect();
            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_owned())
    }

    fn matches(&self, path: &str) -> Option<PathParams> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(PathParams::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = PathParams::new();
                for (segment, value) in segments.iter().zip(path_segments) {
                    match segment {
                        Segment::Static(s) if s != value => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => params.insert(name.clone(), value.to_owned()),
                    }
                }
                Some(params)
            }
        }
    }
}

fn not_found<S>(_ctx: Context<S>) -> ResponseFuture {
    Box::pin(async { Response::new(StatusCode::NotFound).body("Not Found") })
}

struct Route<S> {
    // `None` accepts any method.
    method: Option<Method>,
    pattern: Pattern,
    handler: Handler<S>,
}

impl<S> Route<S> {
    fn matches(&self, method: &Method, path: &str) -> Option<PathParams> {
        match &self.method {
            Some(expected) if expected != method => None,
            _ => self.pattern.matches(path),
        }
    }
}

/// HTTP request router bound to a shared application state `S`.
///
/// When no route matches, `404 Not Found` is returned.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use todoq::context::Context;
/// use todoq::http::{Response, StatusCode};
/// use todoq::router::Router;
///
/// let mut router = Router::new(Arc::new(String::from("hello")));
/// router.get("/greeting", |ctx: Context<String>| async move {
///     Response::new(StatusCode::Ok).body(ctx.state().clone())
/// });
/// assert_eq!(router.len(), 1);
/// ```
pub struct Router<S> {
    routes: Vec<Route<S>>,
    middlewares: Arc<[MiddlewareHandler<S>]>,
    not_found: Handler<S>,
    state: Arc<S>,
}

impl<S: Send + Sync + 'static> Router<S> {
    /// Creates an empty router whose handlers all see `state`.
    pub fn new(state: Arc<S>) -> Self {
        let not_found: Handler<S> = Arc::new(not_found::<S>);
        Self {
            routes: Vec::new(),
            middlewares: Arc::from(Vec::new()),
            not_found,
            state,
        }
    }

    /// Registers a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler<S>) {
        self.add_route(Some(Method::Get), path, handler);
    }

    /// Registers a handler for `POST` requests matching `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler<S>) {
        self.add_route(Some(Method::Post), path, handler);
    }

    /// Registers a handler for every method on `path`.
    pub fn any(&mut self, path: &str, handler: impl IntoHandler<S>) {
        self.add_route(None, path, handler);
    }

    /// Appends a middleware; the first one added is the outermost.
    pub fn layer<M: Middleware<S> + 'static>(&mut self, middleware: M) {
        let mut stack = self.middlewares.to_vec();
        stack.push(from_middleware(Arc::new(middleware)));
        self.middlewares = Arc::from(stack);
    }

    fn add_route(&mut self, method: Option<Method>, path: &str, handler: impl IntoHandler<S>) {
        let handler: Handler<S> = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(path),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatches `request` through the middleware stack to the first matching route.
    pub async fn route(&self, request: Request) -> Response {
        let matched = self.routes.iter().find_map(|route| {
            route
                .matches(request.method(), request.path())
                .map(|params| (Arc::clone(&route.handler), params))
        });

        let (endpoint, params) =
            matched.unwrap_or_else(|| (Arc::clone(&self.not_found), PathParams::new()));
        let ctx = Context::with_params(request, params, Arc::clone(&self.state));
        Next::new(Arc::clone(&self.middlewares), endpoint)
            .run(ctx)
            .await
    }
}
