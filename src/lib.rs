//! # brook
//!
//! A small HTTP framework built from three chains:
//!
//! - **middlewares** wrap every routed request, in registration order;
//! - **handlers** are matched by exact path and method;
//! - **error handlers** turn whatever went wrong into a response, newest
//!   first, with plain-text defaults for 404, 405, 401 and everything else.
//!
//! Request bodies are decoded, and response values encoded, by codecs that
//! middlewares pick from the `Content-Type` and `Accept` headers, so handlers
//! deal in typed values and never in a wire format.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use brook::middleware::body_encoder::json_body_encoder;
//! use brook::middleware::body_parser::json_body_parser;
//! use brook::{BoxError, Request, Response, Router, Server, TaggedError};
//! use http::StatusCode;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct Greet {
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct Greeting {
//!     message: String,
//! }
//!
//! fn greet(req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
//!     let input: Greet = req
//!         .parse_body_into()
//!         .map_err(|e| TaggedError::wrap(StatusCode::BAD_REQUEST, e))?;
//!     res.encode(&Greeting { message: format!("hello, {}", input.name) })
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .middleware(json_body_parser)
//!         .middleware(json_body_encoder)
//!         .post("/greet", greet);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//! ```

mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod codec;
pub mod error;
pub mod error_handler;
pub mod middleware;

pub use error::{BoxError, Tag, TaggedError};
pub use error_handler::{ErrorHandler, Forward};
pub use handler::Handler;
pub use middleware::{Middleware, Next};
pub use request::Request;
pub use response::{ContentType, Response, ResponseSink};
pub use router::{Router, normalize_path};
pub use server::Server;
