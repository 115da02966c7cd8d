//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and dispatches HTTP/1.1 requests to a handler
//! function or a [`Router`]. Connections are persistent (keep-alive) unless
//! the client asks otherwise. The accept loop stops when the shutdown future
//! resolves; connections already being served run to completion.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{MAX_BODY_SIZE, Request, RequestError},
    response::Response,
};
use crate::router::Router;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Room for the request line and headers on top of the largest body.
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Largest request we will buffer before rejecting it.
const MAX_REQUEST_SIZE: usize = MAX_HEAD_SIZE + MAX_BODY_SIZE;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// An HTTP/1.1 server bound to a TCP address.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use todoq::context::Context;
/// use todoq::http::Response;
/// use todoq::router::Router;
/// use todoq::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::new(Arc::new(()));
///     router.get("/", |_ctx: Context<()>| async { Response::html("<p>hello</p>") });
///
///     let server = Server::bind("127.0.0.1:8000").await?;
///     server
///         .serve(router, async {
///             let _ = tokio::signal::ctrl_c().await;
///         })
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves `router` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn serve<S, G>(self, router: Router<S>, shutdown: G) -> Result<(), ServerError>
    where
        S: Send + Sync + 'static,
        G: Future<Output = ()>,
    {
        let router = Arc::new(router);
        self.run(
            move |request| {
                let router = Arc::clone(&router);
                async move { router.route(request).await }
            },
            shutdown,
        )
        .await
    }

    /// Accepts connections and dispatches requests to `handler` until
    /// `shutdown` resolves.
    ///
    /// The handler is shared across all spawned Tokio tasks, so it must be
    /// `Send + Sync + 'static`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F, G>(self, handler: H, shutdown: G) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
        G: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "todoq listening");
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Serves one TCP connection until the peer closes it or a response
/// carries `Connection: close`.
///
/// Buffered bytes are parsed before reading again, so pipelined requests are
/// answered in order without waiting for more input.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        if !buf.is_empty() {
            match Request::parse(&buf) {
                Ok((request, body_offset)) => {
                    let total_needed = body_offset + request.content_length().unwrap_or(0);
                    // Otherwise wait for the rest of the body.
                    if buf.len() >= total_needed {
                        let keep_alive = request.is_keep_alive();
                        debug!(
                            peer = %peer_addr,
                            method = %request.method(),
                            path = %request.path(),
                            "dispatching request"
                        );

                        let response = handler(request).await.keep_alive(keep_alive);
                        stream.write_all(&response.into_bytes()).await?;
                        stream.flush().await?;
                        let _ = buf.split_to(total_needed);

                        if !keep_alive {
                            debug!(peer = %peer_addr, "Connection: close, shutting down");
                            break;
                        }
                        continue;
                    }
                }
                Err(RequestError::Incomplete) => {}
                Err(e @ RequestError::BodyTooLarge { .. }) => {
                    warn!(peer = %peer_addr, error = %e, "body too large, sending 413");
                    reject(&mut stream, StatusCode::PayloadTooLarge, &e.to_string()).await?;
                    break;
                }
                Err(e) => {
                    warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                    reject(&mut stream, StatusCode::BadRequest, &format!("Bad Request: {e}"))
                        .await?;
                    break;
                }
            }
        }

        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large, sending 413");
            reject(&mut stream, StatusCode::PayloadTooLarge, "Request entity too large").await?;
            break;
        }

        if stream.read_buf(&mut buf).await? == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }
    }

    Ok(())
}

async fn reject(stream: &mut TcpStream, status: StatusCode, body: &str) -> std::io::Result<()> {
    let response = Response::new(status).body(body).keep_alive(false);
    stream.write_all(&response.into_bytes()).await?;
    stream.flush().await
}
