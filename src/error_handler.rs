//! Error-handler chain.
//!
//! When routing fails or the pipeline returns `Err`, the router hands the
//! error to its error handlers, newest first. Each handler either writes a
//! response or passes the error (the same one, or a replacement) on with
//! [`Forward::run`]. An error that falls off the end of the chain becomes a
//! plain-text `500` carrying the error's message.
//!
//! [`Router::new`](crate::Router::new) installs four defaults, which run after
//! every user handler in this order: [`method_not_allowed`], [`not_found`],
//! [`unauthorized`], [`fallback`]. The fallback never forwards, so with the
//! defaults in place every error gets a response.
//!
//! ```rust
//! use brook::error_handler::Forward;
//! use brook::error::NOT_FOUND;
//! use brook::{BoxError, ContentType, Request, Response, Router};
//!
//! fn json_not_found(err: BoxError, req: &mut Request, res: &mut Response, forward: Forward<'_>) {
//!     if !NOT_FOUND.matches(err.as_ref()) {
//!         return forward.run(err, req, res);
//!     }
//!     res.set_content_type(ContentType::Json);
//!     res.write_status(NOT_FOUND.status());
//!     res.write(serde_json::json!({ "path": req.path() }).to_string());
//! }
//!
//! let app = Router::new().error_handler(json_not_found);
//! ```

use std::sync::Arc;

use http::header::X_CONTENT_TYPE_OPTIONS;
use http::{HeaderValue, StatusCode};
use tracing::debug;

use crate::error::{BoxError, METHOD_NOT_ALLOWED, NOT_FOUND, Tag, TaggedError, UNAUTHORIZED};
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::router::normalize_path;

/// Turns an error into a response, or forwards it down the chain.
///
/// Implemented for every function or closure with the signature
///
/// ```text
/// Fn(BoxError, &mut Request, &mut Response, Forward<'_>)
/// ```
pub trait ErrorHandler: Send + Sync + 'static {
    fn call(&self, err: BoxError, req: &mut Request, res: &mut Response, forward: Forward<'_>);
}

impl<F> ErrorHandler for F
where
    F: Fn(BoxError, &mut Request, &mut Response, Forward<'_>) + Send + Sync + 'static,
{
    fn call(&self, err: BoxError, req: &mut Request, res: &mut Response, forward: Forward<'_>) {
        self(err, req, res, forward)
    }
}

pub(crate) type BoxedErrorHandler = Arc<dyn ErrorHandler>;

/// The error handlers not yet consulted.
pub struct Forward<'a> {
    pending: &'a [BoxedErrorHandler],
}

impl<'a> Forward<'a> {
    pub(crate) fn new(pending: &'a [BoxedErrorHandler]) -> Self {
        Self { pending }
    }

    /// Hands `err` to the next handler. Past the last one, writes a `500`
    /// with the error's message.
    pub fn run(self, err: BoxError, req: &mut Request, res: &mut Response) {
        match self.pending.split_first() {
            Some((current, pending)) => current.call(err, req, res, Forward { pending }),
            None => {
                debug!(error = %err, "error handler chain exhausted");
                res.set_content_type(ContentType::Text);
                res.set_header(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
                res.write_status(StatusCode::INTERNAL_SERVER_ERROR);
                res.write(format!("{err}\n"));
            }
        }
    }
}

fn write_text(res: &mut Response, status: StatusCode, body: String) {
    res.set_content_type(ContentType::Text);
    res.write_status(status);
    res.write(body);
}

/// Renders any [`TaggedError`] with its own status and message, and anything
/// else as `500 internal server error`.
pub fn fallback(err: BoxError, _req: &mut Request, res: &mut Response, _forward: Forward<'_>) {
    match TaggedError::find(err.as_ref()) {
        Some(tagged) => write_text(res, tagged.status(), tagged.message().to_owned()),
        None => write_text(
            res,
            StatusCode::INTERNAL_SERVER_ERROR,
            "500 internal server error".to_owned(),
        ),
    }
}

pub fn unauthorized(err: BoxError, req: &mut Request, res: &mut Response, forward: Forward<'_>) {
    if !UNAUTHORIZED.matches(err.as_ref()) {
        return forward.run(err, req, res);
    }
    write_text(res, UNAUTHORIZED.status(), "401 unauthorized".to_owned());
}

/// The body names the path exactly as requested.
pub fn not_found(err: BoxError, req: &mut Request, res: &mut Response, forward: Forward<'_>) {
    if !NOT_FOUND.matches(err.as_ref()) {
        return forward.run(err, req, res);
    }
    let body = format!("Cannot find the path \"{}\"", req.path());
    write_text(res, status_of(&err, &NOT_FOUND), body);
}

/// The body names the normalized path, the form routes are registered under.
pub fn method_not_allowed(err: BoxError, req: &mut Request, res: &mut Response, forward: Forward<'_>) {
    if !METHOD_NOT_ALLOWED.matches(err.as_ref()) {
        return forward.run(err, req, res);
    }
    let body = format!(
        "Method \"{}\" is not allowed on path \"{}\"",
        req.method(),
        normalize_path(req.path())
    );
    write_text(res, status_of(&err, &METHOD_NOT_ALLOWED), body);
}

/// Status of the outermost tagged error on the chain; the tag's own when the
/// category was matched deeper down.
fn status_of(err: &BoxError, tag: &'static Tag) -> StatusCode {
    TaggedError::find(err.as_ref()).map_or(tag.status(), TaggedError::status)
}
