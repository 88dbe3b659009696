//! Error types.
//!
//! Handlers and middlewares return [`BoxError`]: any error at all. The
//! error-handler chain decides what each one means for the client.
//!
//! Errors that carry an HTTP meaning are [`TaggedError`]s. A tagged error
//! has a status, a message and, optionally, an identity: the address of a
//! `static` [`Tag`]. Category checks ("is this a not-found?") compare that
//! address anywhere on the [`source`](std::error::Error::source) chain, so a
//! tagged error stays recognisable after it has been wrapped.
//!
//! ```rust
//! use brook::error::{Tag, TaggedError};
//! use http::StatusCode;
//!
//! static DUPLICATE_EMAIL: Tag = Tag::new(StatusCode::CONFLICT, "Duplicate email");
//!
//! let err: brook::BoxError = DUPLICATE_EMAIL.error().into();
//! assert!(DUPLICATE_EMAIL.matches(err.as_ref()));
//!
//! let found = TaggedError::find(err.as_ref()).unwrap();
//! assert_eq!(found.status(), StatusCode::CONFLICT);
//! ```

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// The error type flowing through handlers, middlewares and error handlers.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ── Tags ──────────────────────────────────────────────────────────────────────

/// A stable error identity.
///
/// Declare tags as `static` items; two tags are the same category only if
/// they are the same item. Two statics with identical fields are still two
/// different categories.
#[derive(Debug)]
pub struct Tag {
    status: StatusCode,
    message: &'static str,
}

impl Tag {
    pub const fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &'static str { self.message }

    /// A fresh error of this category, carrying the tag's status and message.
    pub fn error(&'static self) -> TaggedError {
        TaggedError {
            status: self.status,
            message: Cow::Borrowed(self.message),
            tag: Some(self),
            source: None,
        }
    }

    /// An error of this category wrapping `cause`.
    pub fn wrap(&'static self, cause: impl Into<BoxError>) -> TaggedError {
        TaggedError { source: Some(cause.into()), ..self.error() }
    }

    /// Whether any error on the chain starting at `err` carries this tag.
    pub fn matches(&'static self, err: &(dyn StdError + 'static)) -> bool {
        chain(err)
            .filter_map(|e| e.downcast_ref::<TaggedError>())
            .any(|tagged| tagged.has_tag(self))
    }
}

/// Path requested has no route.
pub static NOT_FOUND: Tag = Tag::new(StatusCode::NOT_FOUND, "404 page not found");

/// Path exists, but not for the requested method.
pub static METHOD_NOT_ALLOWED: Tag =
    Tag::new(StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed");

/// Request lacks valid credentials.
pub static UNAUTHORIZED: Tag = Tag::new(StatusCode::UNAUTHORIZED, "401 unauthorized");

// ── TaggedError ───────────────────────────────────────────────────────────────

/// An error with an HTTP status and a client-facing message.
///
/// Built either from a [`Tag`] (so it can be matched by category) or ad hoc
/// with [`TaggedError::new`], in which case it belongs to no category but the
/// fallback error handler still renders its status and message.
#[derive(Debug)]
pub struct TaggedError {
    status: StatusCode,
    message: Cow<'static, str>,
    tag: Option<&'static Tag>,
    source: Option<BoxError>,
}

impl TaggedError {
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self { status, message: message.into(), tag: None, source: None }
    }

    /// Wraps `cause`, using its `Display` output as the message.
    pub fn wrap(status: StatusCode, cause: impl Into<BoxError>) -> Self {
        let cause = cause.into();
        Self {
            status,
            message: Cow::Owned(cause.to_string()),
            tag: None,
            source: Some(cause),
        }
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
    pub fn tag(&self) -> Option<&'static Tag> { self.tag }

    /// Whether this error, or anything it wraps, carries `tag`.
    pub fn is(&self, tag: &'static Tag) -> bool {
        tag.matches(self)
    }

    /// The first [`TaggedError`] on the chain starting at `err`.
    pub fn find<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a TaggedError> {
        chain(err).find_map(|e| e.downcast_ref::<TaggedError>())
    }

    fn has_tag(&self, tag: &'static Tag) -> bool {
        self.tag.is_some_and(|own| std::ptr::eq(own, tag))
    }
}

impl fmt::Display for TaggedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for TaggedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<&'static Tag> for TaggedError {
    fn from(tag: &'static Tag) -> Self { tag.error() }
}

fn chain<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

// ── Infrastructure errors ─────────────────────────────────────────────────────

/// Failures reading a request body through [`Request::parse_body_into`](crate::Request::parse_body_into).
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("body parser not set, content type: {content_type}")]
    NoDecoder { content_type: String },

    #[error("request body already consumed")]
    Consumed,

    #[error("decoder produced no value")]
    Empty,

    #[error("decode request body: {0}")]
    Decode(#[source] BoxError),
}

/// Transport failures surfaced by [`Server::serve`](crate::Server::serve).
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
