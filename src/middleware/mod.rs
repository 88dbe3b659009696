//! Middleware layer.
//!
//! Middleware wraps the matched handler and is the right place for
//! cross-cutting concerns: body parsing, response encoding, authentication,
//! structured tracing.
//!
//! Middlewares registered as `m1, m2, …, mk` around handler `H` run as
//! `m1(m2(…mk(H)…))`. Each receives a [`Next`]; calling [`Next::run`] executes
//! the rest of the pipeline and returns its result. Whatever the middleware
//! itself returns is the pipeline's result:
//!
//! - return `Err` to fail the request, whether or not `next` ran;
//! - return `next.run(req, res)` to pass the downstream result through;
//! - never call `next` to short-circuit: the handler does not run.
//!
//! `Next::run` takes `self`, so running the rest of the pipeline twice does
//! not compile.
//!
//! Built-in middleware:
//! - [`body_parser`]: installs a request body decoder by `Content-Type`
//! - [`body_encoder`]: installs a response encoder and a default `Content-Type`
//! - [`jwt`]: bearer-token authentication
//! - [`trace`]: per-request span with method, path, status, latency

pub mod body_encoder;
pub mod body_parser;
pub mod jwt;
pub mod trace;

use std::sync::Arc;

use crate::error::BoxError;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::Response;

/// Request pre/post-processing around the rest of the pipeline.
///
/// Implemented for every function or closure with the signature
///
/// ```text
/// Fn(&mut Request, &mut Response, Next<'_>) -> Result<(), BoxError>
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError>;
}

impl<F> Middleware for F
where
    F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn call(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
        self(req, res, next)
    }
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// The remainder of the pipeline: the middlewares not yet entered, then the
/// handler.
pub struct Next<'a> {
    pending: &'a [BoxedMiddleware],
    endpoint: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(pending: &'a [BoxedMiddleware], endpoint: &'a dyn Handler) -> Self {
        Self { pending, endpoint }
    }

    /// Runs the next middleware, or the handler once none are left.
    pub fn run(self, req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
        match self.pending.split_first() {
            Some((current, pending)) => {
                current.call(req, res, Next { pending, endpoint: self.endpoint })
            }
            None => self.endpoint.call(req, res),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Mutex;

    use crate::error::TaggedError;
    use http::StatusCode;

    /// Middleware that records entry and exit in a shared log.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recorder {
        fn call(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
            self.log.lock().unwrap().push(format!("enter {}", self.name));
            let result = next.run(req, res);
            self.log.lock().unwrap().push(format!("leave {}", self.name));
            result
        }
    }

    fn run(middlewares: &[BoxedMiddleware], handler: &dyn Handler) -> (Result<(), BoxError>, Response) {
        let mut req = Request::new(http::Request::new(Bytes::new()));
        let mut res = Response::new();
        let result = Next::new(middlewares, handler).run(&mut req, &mut res);
        (result, res)
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> BoxedMiddleware {
        Arc::new(Recorder { name, log: Arc::clone(log) })
    }

    #[test]
    fn middlewares_nest_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);
        let handler = move |_: &mut Request, _: &mut Response| -> Result<(), BoxError> {
            handler_log.lock().unwrap().push("handler".into());
            Ok(())
        };

        let (result, _) = run(&[recorder("a", &log), recorder("b", &log)], &handler);

        assert!(result.is_ok());
        assert_eq!(
            *log.lock().unwrap(),
            ["enter a", "enter b", "handler", "leave b", "leave a"]
        );
    }

    #[test]
    fn error_without_next_skips_handler() {
        let reached = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&reached);
        let handler = move |_: &mut Request, _: &mut Response| -> Result<(), BoxError> {
            *flag.lock().unwrap() = true;
            Ok(())
        };
        let deny: BoxedMiddleware =
            Arc::new(|_: &mut Request, _: &mut Response, _: Next<'_>| -> Result<(), BoxError> {
                Err(TaggedError::new(StatusCode::FORBIDDEN, "no").into())
            });

        let (result, _) = run(&[deny], &handler);

        assert!(result.is_err());
        assert!(!*reached.lock().unwrap());
    }

    #[test]
    fn downstream_error_reaches_caller() {
        let failing = |_: &mut Request, _: &mut Response| -> Result<(), BoxError> { Err("handler failed".into()) };
        let passthrough: BoxedMiddleware =
            Arc::new(|req: &mut Request, res: &mut Response, next: Next<'_>| next.run(req, res));

        let (result, _) = run(&[passthrough], &failing);
        assert_eq!(result.unwrap_err().to_string(), "handler failed");
    }

    #[test]
    fn middleware_error_wins_over_downstream_error() {
        let failing = |_: &mut Request, _: &mut Response| -> Result<(), BoxError> { Err("handler failed".into()) };
        let replace: BoxedMiddleware =
            Arc::new(|req: &mut Request, res: &mut Response, next: Next<'_>| -> Result<(), BoxError> {
                let _ = next.run(req, res);
                Err("middleware failed".into())
            });

        let (result, _) = run(&[replace], &failing);
        assert_eq!(result.unwrap_err().to_string(), "middleware failed");
    }

    #[test]
    fn middleware_may_swallow_downstream_error() {
        let failing = |_: &mut Request, _: &mut Response| -> Result<(), BoxError> { Err("handler failed".into()) };
        let rescue: BoxedMiddleware =
            Arc::new(|req: &mut Request, res: &mut Response, next: Next<'_>| -> Result<(), BoxError> {
                if next.run(req, res).is_err() {
                    res.write_status(StatusCode::SERVICE_UNAVAILABLE);
                }
                Ok(())
            });

        let (result, res) = run(&[rescue], &failing);
        assert!(result.is_ok());
        assert_eq!(res.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn empty_chain_runs_handler() {
        let handler = |_: &mut Request, res: &mut Response| -> Result<(), BoxError> {
            res.write("direct");
            Ok(())
        };
        let (result, res) = run(&[], &handler);
        assert!(result.is_ok());
        assert_eq!(res.body(), b"direct");
    }
}
