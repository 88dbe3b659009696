//! Outgoing HTTP response.
//!
//! A [`Response`] is a buffered [`ResponseSink`] (status, headers, body) plus
//! the encoder chain that turns values into body bytes. Nothing reaches the
//! wire until the pipeline and the error chain have both returned; the
//! router then converts the sink into an [`http::Response`].

use std::io;

use bytes::{Bytes, BytesMut};
use http::header::{AsHeaderName, CONTENT_TYPE, IntoHeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::codec::{Encoder, base_encoder};
use crate::error::BoxError;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Response::set_content_type`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream  (binary / file download)
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── ResponseSink ──────────────────────────────────────────────────────────────

/// Status, headers and body of a response under construction.
///
/// Two rules mirror a streaming writer:
///
/// - the status is written at most once; later writes are ignored;
/// - headers are frozen by the first body byte; later mutations are ignored.
///
/// Both violations are logged at `warn`. Writing body bytes before any status
/// implies `200 OK`.
#[derive(Debug, Default)]
pub struct ResponseSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    body_started: bool,
}

impl ResponseSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The status written so far, if any.
    pub fn status(&self) -> Option<StatusCode> { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Header value as text. Non-UTF-8 values read as absent.
    pub fn header(&self, name: impl AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a header, replacing any previous value.
    pub fn set_header(&mut self, name: impl IntoHeaderName, value: HeaderValue) {
        if self.body_started {
            warn!("header set after the body started; ignored");
            return;
        }
        self.headers.insert(name, value);
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.set_header(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
    }

    pub fn write_status(&mut self, status: StatusCode) {
        match self.status {
            Some(written) => warn!(%written, ignored = %status, "status already written"),
            None => self.status = Some(status),
        }
    }

    /// Appends body bytes.
    pub fn write(&mut self, bytes: impl AsRef<[u8]>) {
        self.append(bytes.as_ref());
    }

    fn append(&mut self, bytes: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body_started = true;
        self.body.extend_from_slice(bytes);
    }

    pub(crate) fn into_http(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(self.body.freeze());
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

/// Lets serializers stream straight into the body.
impl io::Write for ResponseSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

/// The response handed to middlewares, handlers and error handlers.
///
/// ```rust
/// use brook::{ContentType, Response};
/// use brook::codec::json_encoder_decorator;
/// use http::StatusCode;
///
/// let mut res = Response::new();
/// res.use_encoder_decorator(json_encoder_decorator);
/// res.set_content_type(ContentType::Json);
/// res.write_status(StatusCode::CREATED);
/// res.encode(&serde_json::json!({ "id": 42 })).unwrap();
///
/// assert_eq!(res.body(), br#"{"id":42}"#);
/// ```
pub struct Response {
    sink: ResponseSink,
    encoder: Encoder,
}

impl Response {
    pub fn new() -> Self {
        Self { sink: ResponseSink::new(), encoder: base_encoder() }
    }

    pub fn sink(&self) -> &ResponseSink { &self.sink }
    pub fn sink_mut(&mut self) -> &mut ResponseSink { &mut self.sink }

    pub fn status(&self) -> Option<StatusCode> { self.sink.status() }
    pub fn headers(&self) -> &HeaderMap { self.sink.headers() }
    pub fn body(&self) -> &[u8] { self.sink.body() }

    pub fn header(&self, name: impl AsHeaderName) -> Option<&str> {
        self.sink.header(name)
    }

    pub fn set_header(&mut self, name: impl IntoHeaderName, value: HeaderValue) {
        self.sink.set_header(name, value);
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.sink.set_content_type(content_type);
    }

    pub fn write_status(&mut self, status: StatusCode) {
        self.sink.write_status(status);
    }

    pub fn write(&mut self, bytes: impl AsRef<[u8]>) {
        self.sink.write(bytes);
    }

    /// Wraps the current encoder with `decorator`. The newest decorator is
    /// consulted first.
    pub fn use_encoder_decorator(&mut self, decorator: impl FnOnce(Encoder) -> Encoder) {
        let current = std::mem::replace(&mut self.encoder, base_encoder());
        self.encoder = decorator(current);
    }

    /// Serializes `value` with the effective encoder.
    pub fn encode<T: Serialize>(&mut self, value: &T) -> Result<(), BoxError> {
        let value: &dyn erased_serde::Serialize = value;
        (self.encoder)(&mut self.sink, value)
    }

    pub(crate) fn into_http(self) -> http::Response<Bytes> {
        self.sink.into_http()
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}
