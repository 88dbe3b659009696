//! Body-encoder middleware: register a response serializer and, when the
//! client's `Accept` header asks for it, make it the default `Content-Type`.
//!
//! Handlers produce bodies with [`Response::encode`]; the `Content-Type` in
//! effect at that moment picks the serializer.

use http::header::ACCEPT;

use crate::codec::{json_encoder_decorator, xml_encoder_decorator};
use crate::error::BoxError;
use crate::middleware::Next;
use crate::request::Request;
use crate::response::{ContentType, Response};

/// Adds the JSON encoder. Sets `Content-Type: application/json` when the
/// request has no `Accept`, accepts `*/*`, or asks for JSON.
pub fn json_body_encoder(req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
    res.use_encoder_decorator(json_encoder_decorator);

    let wants_json = match req.header(ACCEPT) {
        None | Some("") | Some("*/*") => true,
        Some(accept) => accept.starts_with(ContentType::Json.as_str()),
    };
    if wants_json {
        res.set_content_type(ContentType::Json);
    }

    next.run(req, res)
}

/// Adds the XML encoder. Sets `Content-Type: application/xml` when the
/// request asks for XML.
pub fn xml_body_encoder(req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
    res.use_encoder_decorator(xml_encoder_decorator);

    if req.header(ACCEPT).is_some_and(|accept| accept.starts_with(ContentType::Xml.as_str())) {
        res.set_content_type(ContentType::Xml);
    }

    next.run(req, res)
}
