//! Exact-match request router.
//!
//! Routes are keyed by normalized path, then by method. There are no path
//! parameters or wildcards: `/users`, `/users/` and `users` are the same
//! route, `/users/42` is a different one. Requests that match no path raise
//! [`NOT_FOUND`]; requests that match a path but not its method raise
//! [`METHOD_NOT_ALLOWED`]. Both go through the error-handler chain like any
//! handler error.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use tracing::debug;

use crate::error::{BoxError, METHOD_NOT_ALLOWED, NOT_FOUND};
use crate::error_handler::{self, BoxedErrorHandler, ErrorHandler, Forward};
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Strips leading and trailing `/`. The root, and a path made only of
/// slashes, normalize to `"/"`.
///
/// ```rust
/// use brook::normalize_path;
///
/// assert_eq!(normalize_path("/users/"), "users");
/// assert_eq!(normalize_path("//"), "/");
/// assert_eq!(normalize_path(normalize_path("/a/b/")), "a/b");
/// ```
pub fn normalize_path(path: &str) -> &str {
    match path.trim_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// The application: routes, middlewares and error handlers.
///
/// Build it once at startup, then hand it to [`Server::serve`](crate::Server::serve)
/// or drive it directly with [`Router::serve`].
///
/// ```rust
/// use brook::middleware::body_encoder::json_body_encoder;
/// use brook::{BoxError, Request, Response, Router};
/// use bytes::Bytes;
///
/// fn hello(_req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
///     res.encode(&serde_json::json!({ "hello": "world" }))
/// }
///
/// let app = Router::new()
///     .middleware(json_body_encoder)
///     .get("/hello", hello);
///
/// let res = app.serve(http::Request::get("/hello").body(Bytes::new()).unwrap());
/// assert_eq!(res.status(), 200);
/// assert_eq!(res.body().as_ref(), br#"{"hello":"world"}"#);
/// ```
pub struct Router {
    routes: HashMap<String, HashMap<Method, BoxedHandler>>,
    middlewares: Vec<BoxedMiddleware>,
    error_handlers: Vec<BoxedErrorHandler>,
}

impl Router {
    /// An empty router with the default error handlers installed.
    pub fn new() -> Self {
        Self::bare()
            .error_handler(error_handler::fallback)
            .error_handler(error_handler::unauthorized)
            .error_handler(error_handler::not_found)
            .error_handler(error_handler::method_not_allowed)
    }

    fn bare() -> Self {
        Self {
            routes: HashMap::new(),
            middlewares: Vec::new(),
            error_handlers: Vec::new(),
        }
    }

    /// Registers `handler` for `method` on `path`. Registering the same pair
    /// again replaces the earlier handler.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let path = normalize_path(path);
        let replaced = self
            .routes
            .entry(path.to_owned())
            .or_default()
            .insert(method.clone(), Arc::new(handler))
            .is_some();
        if replaced {
            debug!(%method, path, "route replaced");
        }
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Appends a middleware. Middlewares run in registration order, and only
    /// for requests that matched a route.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Adds an error handler ahead of every handler already registered,
    /// including the defaults.
    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.error_handlers.insert(0, Arc::new(handler));
        self
    }

    /// Registered `(path, method)` pairs, in no particular order.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &Method)> {
        self.routes
            .iter()
            .flat_map(|(path, methods)| methods.keys().map(move |method| (path.as_str(), method)))
    }

    /// Runs one request through routing, middlewares, the handler and, on
    /// failure, the error-handler chain.
    pub fn serve(&self, req: http::Request<Bytes>) -> http::Response<Bytes> {
        let mut req = Request::new(req);
        let mut res = Response::new();

        if let Err(err) = self.dispatch(&mut req, &mut res) {
            self.handle_error(err, &mut req, &mut res);
        }
        res.into_http()
    }

    fn dispatch(&self, req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
        let path = normalize_path(req.path());
        let methods = self.routes.get(path).ok_or_else(|| NOT_FOUND.error())?;
        let handler = methods.get(req.method()).ok_or_else(|| METHOD_NOT_ALLOWED.error())?;

        Next::new(&self.middlewares, handler.as_ref()).run(req, res)
    }

    /// Hands `err` to the error-handler chain, newest handler first.
    pub fn handle_error(&self, err: BoxError, req: &mut Request, res: &mut Response) {
        debug!(method = %req.method(), path = %req.path(), error = %err, "handling error");
        Forward::new(&self.error_handlers).run(err, req, res);
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
