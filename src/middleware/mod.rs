//! Middleware pipeline: composable before/after request handler logic.
//!
//! Each middleware wraps the next layer, and the innermost layer is the
//! handler of the matched route. The router builds one [`Next`] per request.
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining chain; call [`Next::run`] to advance.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware function.
//! - [`LoggerMiddleware`]: one structured log event per request.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::context::Context;
use crate::router::{Handler, ResponseFuture};

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler<S> = Arc<dyn Fn(Context<S>, Next<S>) -> ResponseFuture + Send + Sync>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<S, M>(middleware: Arc<M>) -> MiddlewareHandler<S>
where
    S: Send + Sync + 'static,
    M: Middleware<S> + 'static,
{
    Arc::new(move |ctx: Context<S>, next: Next<S>| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can forward a
/// request at most once. When every middleware has run, the route's
/// endpoint handles the request.
pub struct Next<S> {
    middlewares: Arc<[MiddlewareHandler<S>]>,
    index: usize,
    endpoint: Handler<S>,
}

impl<S> Next<S> {
    /// Creates a cursor at the start of `middlewares`, ending in `endpoint`.
    pub fn new(middlewares: Arc<[MiddlewareHandler<S>]>, endpoint: Handler<S>) -> Self {
        Self {
            middlewares,
            index: 0,
            endpoint,
        }
    }

    /// Invokes the next middleware, or the endpoint once the chain is exhausted.
    pub async fn run(mut self, ctx: Context<S>) -> crate::http::Response {
        match self.middlewares.get(self.index).cloned() {
            Some(handler) => {
                self.index += 1;
                handler(ctx, self).await
            }
            None => (self.endpoint)(ctx).await,
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors may pass a request through (`next.run(ctx).await`),
/// short-circuit with their own response, or decorate the downstream response.
pub trait Middleware<S>: Send + Sync {
    fn handle(&self, ctx: Context<S>, next: Next<S>) -> ResponseFuture;
}

/// Logs each request's method, path, status and duration.
///
/// Server errors are logged at `warn`, everything else at `info`.
pub struct LoggerMiddleware;

impl<S: Send + Sync + 'static> Middleware<S> for LoggerMiddleware {
    fn handle(&self, ctx: Context<S>, next: Next<S>) -> ResponseFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().to_string();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;

            let elapsed_ms = start.elapsed().as_millis() as u64;
            let status = response.status().as_u16();
            if status >= 500 {
                warn!(%method, %path, status, elapsed_ms, "request failed");
            } else {
                info!(%method, %path, status, elapsed_ms, "request served");
            }

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Response, StatusCode};

    struct Stamp(&'static str);

    impl Middleware<()> for Stamp {
        fn handle(&self, ctx: Context<()>, next: Next<()>) -> ResponseFuture {
            let tag = self.0;
            Box::pin(async move {
                let mut response = next.run(ctx).await;
                response.add_header("X-Layer", tag);
                response
            })
        }
    }

    struct Deny;

    impl Middleware<()> for Deny {
        fn handle(&self, _ctx: Context<()>, _next: Next<()>) -> ResponseFuture {
            Box::pin(async { Response::new(StatusCode::BadRequest) })
        }
    }

    fn ctx() -> Context<()> {
        let (request, _) = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        Context::new(request, Arc::new(()))
    }

    fn ok(_ctx: Context<()>) -> ResponseFuture {
        Box::pin(async { Response::new(StatusCode::Ok) })
    }

    fn endpoint() -> Handler<()> {
        Arc::new(ok)
    }

    #[tokio::test]
    async fn empty_chain_reaches_endpoint() {
        let next = Next::new(Arc::from(Vec::new()), endpoint());
        assert_eq!(next.run(ctx()).await.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn layers_decorate_inside_out() {
        let chain: Vec<MiddlewareHandler<()>> = vec![
            from_middleware(Arc::new(Stamp("outer"))),
            from_middleware(Arc::new(Stamp("inner"))),
        ];
        let response = Next::new(Arc::from(chain), endpoint()).run(ctx()).await;
        let layers: Vec<_> = response
            .headers()
            .iter()
            .filter(|(name, _)| *name == "X-Layer")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(layers, vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_endpoint() {
        let chain: Vec<MiddlewareHandler<()>> = vec![
            from_middleware(Arc::new(LoggerMiddleware)),
            from_middleware(Arc::new(Deny)),
        ];
        let response = Next::new(Arc::from(chain), endpoint()).run(ctx()).await;
        assert_eq!(response.status(), StatusCode::BadRequest);
    }
}
