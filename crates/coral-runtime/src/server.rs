//! HTTP server lifecycle
//!
//! Wraps bind/listen/close around the plugin middleware chain and the API
//! dispatch handler. A bind failure because the port is occupied never fails
//! the caller: the server stops any partially-created listener, waits a fixed
//! delay on a cancellable timer, and retries until the port frees or the
//! host shuts down.

use crate::shutdown::ShutdownSignal;
use coral_core::{Body, Error, Middleware, Next, Result};
use coral_plugins::HostContext;
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::{Component, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Everything a request needs, frozen at server initialization
pub(crate) struct AppState {
    pub(crate) ctx: Arc<HostContext>,
    pub(crate) middleware: Arc<[Arc<dyn Middleware>]>,
    pub(crate) api_path: String,
    pub(crate) static_paths: Vec<PathBuf>,
}

struct ListenerHandle {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct ServerState {
    app: Option<Arc<AppState>>,
    listener: Option<ListenerHandle>,
}

/// HTTP server with port-in-use recovery
pub struct ApiServer {
    retry_delay: Duration,
    shutdown: ShutdownSignal,
    state: Mutex<ServerState>,
}

impl std::fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServer")
            .field("retry_delay", &self.retry_delay)
            .field("bound", &self.bound_addr())
            .finish()
    }
}

impl ApiServer {
    /// Create an uninitialized server
    pub fn new(retry_delay: Duration, shutdown: ShutdownSignal) -> Self {
        Self {
            retry_delay,
            shutdown,
            state: Mutex::new(ServerState::default()),
        }
    }

    /// Install the request state: context, middleware chain, and static paths
    pub(crate) fn init(&self, app: AppState) {
        let mut state = self.state.lock();
        state.app = Some(Arc::new(app));
    }

    /// The bound address, when listening
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        self.state.lock().listener.as_ref().map(|l| l.addr)
    }

    /// Bind and start serving on `port`.
    ///
    /// `None` resolves immediately without binding, for embedding and tests.
    /// When the port is occupied the call does not fail: it closes any
    /// partially-created listener, waits [`retry_delay`](Self::new) on a timer
    /// cancellable by host shutdown, and tries again until the port frees.
    /// Any other bind error fails immediately.
    pub async fn listen(&self, port: Option<u16>) -> Result<Option<SocketAddr>> {
        let Some(port) = port else {
            debug!("No port configured; server created but not listening");
            return Ok(None);
        };

        let app = self
            .state
            .lock()
            .app
            .clone()
            .ok_or_else(|| Error::runtime("server must be initialized before listen"))?;

        if let Some(addr) = self.bound_addr() {
            debug!(%addr, "Server is already listening");
            return Ok(Some(addr));
        }

        loop {
            match TcpListener::bind(("0.0.0.0", port)).await {
                Ok(listener) => {
                    let addr = listener.local_addr()?;
                    let handle = self.spawn_accept_loop(listener, addr, Arc::clone(&app));
                    self.state.lock().listener = Some(handle);
                    info!(%addr, "Server listening");
                    return Ok(Some(addr));
                }
                Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                    error!(
                        port,
                        retry_in_secs = self.retry_delay.as_secs_f64(),
                        "Port is in use. Stop whatever is listening on that port; retrying."
                    );
                    self.close().await?;

                    let mut shutdown_rx = self.shutdown.subscribe();
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_delay) => {}
                        _ = shutdown_rx.recv() => {
                            info!("Listen retry cancelled by shutdown");
                            return Ok(None);
                        }
                    }
                }
                Err(err) => {
                    return Err(Error::runtime(format!(
                        "failed to bind port {port}: {err}"
                    )));
                }
            }
        }
    }

    /// Stop listening.
    ///
    /// A no-op when no listener is bound or it was already closed.
    pub async fn close(&self) -> Result<()> {
        let handle = { self.state.lock().listener.take() };

        let Some(handle) = handle else {
            return Ok(());
        };

        let _ = handle.stop.send(());
        if let Err(err) = handle.task.await {
            warn!(error = %err, "Accept loop ended abnormally");
        }
        info!(addr = %handle.addr, "Server stopped listening");
        Ok(())
    }

    fn spawn_accept_loop(
        &self,
        listener: TcpListener,
        addr: SocketAddr,
        app: Arc<AppState>,
    ) -> ListenerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                trace!(%peer, "Accepted connection");
                                let app = Arc::clone(&app);
                                tokio::spawn(async move {
                                    let service = hyper::service::service_fn(move |req| {
                                        let app = Arc::clone(&app);
                                        async move {
                                            let res = handle_request(app, req)
                                                .await
                                                .unwrap_or_else(error_response);
                                            Ok::<_, std::convert::Infallible>(res)
                                        }
                                    });

                                    let io = TokioIo::new(stream);
                                    if let Err(err) = hyper::server::conn::http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!(error = %err, "HTTP connection error");
                                    }
                                });
                            }
                            Err(err) => {
                                error!(error = %err, "Failed to accept connection");
                            }
                        }
                    }
                    _ = &mut stop_rx => {
                        debug!("Accept loop stopping");
                        break;
                    }
                }
            }
        });

        ListenerHandle {
            addr,
            stop: stop_tx,
            task,
        }
    }
}

fn error_response(err: Error) -> Response<Body> {
    error!(error = %err, "Request handler error");
    let mut res = Response::new(Body::from(format!("Error: {err}")));
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res
}

async fn handle_request(
    app: Arc<AppState>,
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Body>> {
    let (parts, body) = req.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|err| Error::runtime(format!("failed to read request body: {err}")))?
        .to_bytes();
    let req = Request::from_parts(parts, Body::from(bytes));

    let terminal_app = Arc::clone(&app);
    let chain = Next::with_handler(
        Arc::clone(&app.middleware),
        Box::new(move |req| {
            let app = Arc::clone(&terminal_app);
            Box::pin(async move { dispatch(app, req).await })
        }),
    );

    chain.run(req).await
}

/// Terminal handler: API operation dispatch, then static assets, then 404
async fn dispatch(app: Arc<AppState>, req: Request<Body>) -> Result<Response<Body>> {
    let path = req.uri().path().to_string();

    if req.method() == Method::POST && path == app.api_path {
        return dispatch_operation(app, req).await;
    }

    if req.method() == Method::GET {
        if let Some(res) = serve_static(&app, &path).await? {
            return Ok(res);
        }
    }

    Ok(json_response(
        StatusCode::NOT_FOUND,
        &json!({ "errors": [format!("no route for {path}")] }),
    ))
}

async fn dispatch_operation(app: Arc<AppState>, req: Request<Body>) -> Result<Response<Body>> {
    let body = req.into_body().collect().await.map_err(|err| {
        Error::runtime(format!("failed to buffer API request body: {err}"))
    })?;
    let payload: Value = match serde_json::from_slice(&body.to_bytes()) {
        Ok(payload) => payload,
        Err(err) => {
            return Ok(json_response(
                StatusCode::BAD_REQUEST,
                &json!({ "errors": [format!("invalid JSON body: {err}")] }),
            ));
        }
    };

    let operation = payload.get("operation").and_then(Value::as_str).unwrap_or("query");
    let name = payload.get("name").and_then(Value::as_str).unwrap_or("");
    let args = payload.get("args").cloned().unwrap_or(Value::Null);

    let handler = match operation {
        "query" => app.ctx.queries().get(name),
        "mutation" => app.ctx.mutations().get(name),
        other => {
            return Ok(json_response(
                StatusCode::BAD_REQUEST,
                &json!({ "errors": [format!("unknown operation kind \"{other}\"")] }),
            ));
        }
    };

    let Some(handler) = handler else {
        return Ok(json_response(
            StatusCode::NOT_FOUND,
            &json!({ "errors": [format!("no {operation} named \"{name}\"")] }),
        ));
    };

    match handler(Arc::clone(&app.ctx), args).await {
        Ok(data) => Ok(json_response(StatusCode::OK, &json!({ "data": data }))),
        Err(err) => {
            warn!(operation, name, error = %err, "API operation failed");
            Ok(json_response(
                StatusCode::BAD_REQUEST,
                &json!({ "errors": [err.to_string()] }),
            ))
        }
    }
}

async fn serve_static(app: &AppState, path: &str) -> Result<Option<Response<Body>>> {
    if app.static_paths.is_empty() {
        return Ok(None);
    }

    let relative = PathBuf::from(path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Ok(None);
    }

    for dir in &app.static_paths {
        let candidate = dir.join(&relative);
        let is_file = tokio::fs::metadata(&candidate)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }

        match tokio::fs::read(&candidate).await {
            Ok(contents) => {
                let mut res = Response::new(Body::from(contents));
                res.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static(content_type_for(&candidate)),
                );
                return Ok(Some(res));
            }
            Err(err) => {
                warn!(path = %candidate.display(), error = %err, "Failed to read static asset");
                continue;
            }
        }
    }

    Ok(None)
}

fn content_type_for(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn json_response(status: StatusCode, value: &Value) -> Response<Body> {
    let mut res = Response::new(Body::from(value.to_string()));
    *res.status_mut() = status;
    res.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_app() -> AppState {
        AppState {
            ctx: Arc::new(HostContext::default()),
            middleware: Arc::new([]),
            api_path: "/api".to_string(),
            static_paths: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_listen_without_port_resolves_unbound() {
        let server = ApiServer::new(Duration::from_millis(10), ShutdownSignal::new());
        server.init(empty_app());

        assert!(server.listen(None).await.unwrap().is_none());
        assert!(server.bound_addr().is_none());
    }

    #[tokio::test]
    async fn test_listen_before_init_fails() {
        let server = ApiServer::new(Duration::from_millis(10), ShutdownSignal::new());
        assert!(server.listen(Some(0)).await.is_err());
    }

    #[tokio::test]
    async fn test_close_twice_is_a_noop() {
        let server = ApiServer::new(Duration::from_millis(10), ShutdownSignal::new());
        server.init(empty_app());

        let addr = server.listen(Some(0)).await.unwrap().unwrap();
        assert_eq!(server.bound_addr(), Some(addr));

        server.close().await.unwrap();
        assert!(server.bound_addr().is_none());
        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_listen_when_already_bound_returns_existing_addr() {
        let server = ApiServer::new(Duration::from_millis(10), ShutdownSignal::new());
        server.init(empty_app());

        let first = server.listen(Some(0)).await.unwrap().unwrap();
        let second = server.listen(Some(first.port())).await.unwrap().unwrap();
        assert_eq!(first, second);

        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_a_pending_listen_retry() {
        let blocker = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let shutdown = ShutdownSignal::new();
        let server = ApiServer::new(Duration::from_secs(60), shutdown.clone());
        server.init(empty_app());

        // Trigger shutdown shortly after the retry wait begins.
        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.trigger();
        });

        let bound = server.listen(Some(port)).await.unwrap();
        assert!(bound.is_none());
        trigger.await.unwrap();
    }
}

