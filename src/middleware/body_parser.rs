//! Body-parser middleware: pick a request [`Decoder`](crate::codec::Decoder)
//! from the `Content-Type` header.
//!
//! Each parser recognises one media type by prefix and otherwise leaves the
//! request alone, so parsers for different formats can be stacked. The
//! handler then calls [`Request::parse_body_into`].

use http::header::CONTENT_TYPE;

use crate::codec::{decode_json, decode_xml};
use crate::error::BoxError;
use crate::middleware::Next;
use crate::request::Request;
use crate::response::{ContentType, Response};

/// Installs the JSON decoder for `application/json` bodies.
pub fn json_body_parser(req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
    if content_type_is(req, ContentType::Json) {
        req.set_decoder(decode_json);
    }
    next.run(req, res)
}

/// Installs the XML decoder for `application/xml` bodies.
pub fn xml_body_parser(req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
    if content_type_is(req, ContentType::Xml) {
        req.set_decoder(decode_xml);
    }
    next.run(req, res)
}

fn content_type_is(req: &Request, content_type: ContentType) -> bool {
    req.header(CONTENT_TYPE)
        .is_some_and(|value| value.starts_with(content_type.as_str()))
}
