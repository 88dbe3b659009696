//! Request tracing middleware.
//!
//! Opens an `info` span per request carrying the method and raw path, and
//! logs the outcome with its latency when the pipeline returns. Register it
//! first so the span covers every other middleware.

use std::time::Instant;

use tracing::{info, info_span, warn};

use crate::error::BoxError;
use crate::middleware::Next;
use crate::request::Request;
use crate::response::Response;

pub fn trace_request(req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
    let span = info_span!("request", method = %req.method(), path = %req.path());
    let _entered = span.enter();

    let started = Instant::now();
    let result = next.run(req, res);
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    match &result {
        Ok(()) => {
            let status = res.status().map_or(200, |s| s.as_u16());
            info!(status, elapsed_ms, "request handled");
        }
        // The error chain has not run yet, so the final status is unknown here.
        Err(err) => warn!(error = %err, elapsed_ms, "request failed"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::middleware::BoxedMiddleware;
    use bytes::Bytes;
    use http::StatusCode;
    use std::sync::Arc;

    fn run(handler: &dyn Handler) -> (Result<(), BoxError>, Response) {
        let chain: [BoxedMiddleware; 1] = [Arc::new(trace_request)];
        let mut req = Request::new(http::Request::new(Bytes::new()));
        let mut res = Response::new();
        let result = Next::new(&chain, handler).run(&mut req, &mut res);
        (result, res)
    }

    #[test]
    fn passes_success_through() {
        let created = |_: &mut Request, res: &mut Response| -> Result<(), BoxError> {
            res.write_status(StatusCode::CREATED);
            Ok(())
        };
        let (result, res) = run(&created);
        assert!(result.is_ok());
        assert_eq!(res.status(), Some(StatusCode::CREATED));
    }

    #[test]
    fn passes_errors_through_unchanged() {
        let failing = |_: &mut Request, _: &mut Response| -> Result<(), BoxError> { Err("boom".into()) };
        let (result, _) = run(&failing);
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }
}
