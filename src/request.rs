//! Incoming HTTP request.

use std::sync::Arc;

use bytes::{Buf, Bytes};
use http::header::{AsHeaderName, CONTENT_TYPE};
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri, Version};
use serde::de::DeserializeOwned;

use crate::codec::Decoder;
use crate::error::BodyError;

/// An incoming HTTP request, as seen by middlewares and handlers.
///
/// Wraps the transport request's parts and body, plus two pieces of
/// per-request state:
///
/// - the [`Decoder`] a body-parser middleware installed, used by
///   [`parse_body_into`](Request::parse_body_into);
/// - a typed context bag ([`context`](Request::context) /
///   [`set_context`](Request::set_context)) where middlewares leave values
///   for handlers, one value per type.
pub struct Request {
    parts: Parts,
    body: Option<Bytes>,
    decoder: Option<Arc<dyn Decoder>>,
}

impl Request {
    pub fn new(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self { parts, body: Some(body), decoder: None }
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn version(&self) -> Version { self.parts.version }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.parts.headers }

    /// The raw URI path, exactly as the transport delivered it.
    pub fn path(&self) -> &str { self.parts.uri.path() }

    /// Header value as text. Non-UTF-8 values read as absent.
    pub fn header(&self, name: impl AsHeaderName) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn context<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.parts.extensions.get::<T>()
    }

    /// Stores `value`, returning the previous value of the same type.
    pub fn set_context<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.parts.extensions.insert(value)
    }

    pub fn extensions(&self) -> &Extensions { &self.parts.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.parts.extensions }

    /// Takes the body. The body is single-pass: the second call returns `None`.
    pub fn take_body(&mut self) -> Option<Bytes> {
        self.body.take()
    }

    /// Installs the decoder used by [`parse_body_into`](Request::parse_body_into),
    /// replacing any earlier one.
    pub fn set_decoder(&mut self, decoder: impl Decoder + 'static) {
        self.decoder = Some(Arc::new(decoder));
    }

    pub fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }

    /// Decodes the body into a `T` with the installed decoder.
    ///
    /// Consumes the body, so it succeeds at most once per request.
    ///
    /// # Errors
    ///
    /// - [`BodyError::NoDecoder`] when no body parser recognised the request;
    /// - [`BodyError::Consumed`] when the body was already read;
    /// - [`BodyError::Decode`] when the decoder rejects the body.
    pub fn parse_body_into<T: DeserializeOwned>(&mut self) -> Result<T, BodyError> {
        let Some(decoder) = self.decoder.clone() else {
            return Err(BodyError::NoDecoder {
                content_type: self.header(CONTENT_TYPE).unwrap_or_default().to_owned(),
            });
        };
        let body = self.take_body().ok_or(BodyError::Consumed)?;

        let mut reader = body.reader();
        let mut value = None;
        decoder
            .decode(&mut reader, &mut |de| {
                value = Some(erased_serde::deserialize::<T>(de)?);
                Ok(())
            })
            .map_err(BodyError::Decode)?;

        value.ok_or(BodyError::Empty)
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self { Self::new(req) }
}
