//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! The router needs to hold handlers of *different* types in a single
//! `HashMap<String, HashMap<Method, _>>`. Rust collections can only hold one
//! concrete type, so every handler is stored as a trait object behind an
//! `Arc`:
//!
//! ```text
//! fn register(req, res) -> Result<(), BoxError>   ← user writes this
//!        ↓ router.post("/register", register)
//! Arc::new(register)                               ← BoxedHandler
//!        ↓
//! handler.call(&mut req, &mut res)  per request    ← one vtable dispatch
//! ```
//!
//! Handlers run synchronously and write into the [`Response`]; failures are
//! returned and handed to the router's error-handler chain.

use std::sync::Arc;

use crate::error::BoxError;
use crate::request::Request;
use crate::response::Response;

/// A terminal request handler.
///
/// Implemented for every function or closure with the signature
///
/// ```text
/// Fn(&mut Request, &mut Response) -> Result<(), BoxError>
/// ```
///
/// Closures need their argument and return types spelled out so the compiler
/// can see they accept any borrow:
///
/// ```rust
/// use brook::{BoxError, Request, Response, Router};
///
/// let app = Router::new().get("/ping", |_req: &mut Request, res: &mut Response| -> Result<(), BoxError> {
///     res.write("pong");
///     Ok(())
/// });
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: &mut Request, res: &mut Response) -> Result<(), BoxError>;
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &mut Response) -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn call(&self, req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
        self(req, res)
    }
}

/// A type-erased handler shared across concurrent requests.
pub(crate) type BoxedHandler = Arc<dyn Handler>;
