//! Bearer-token (JWT) authentication middleware.
//!
//! [`JwtAuth`] reads `Authorization: Bearer <token>`, validates the token with
//! [`jsonwebtoken`] and leaves the token's [`Claims`] in the request context
//! for handlers:
//!
//! ```rust
//! use brook::middleware::jwt::{self, JwtAuth, JwtOptions};
//! use brook::{BoxError, Request, Response, Router};
//!
//! fn whoami(req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
//!     let subject = jwt::claims(req).and_then(|c| c.subject()).unwrap_or("anonymous");
//!     res.write(subject.to_owned());
//!     Ok(())
//! }
//!
//! let app = Router::new()
//!     .middleware(JwtAuth::new(JwtOptions::hmac(b"secret")))
//!     .get("/whoami", whoami);
//! ```
//!
//! Every rejection is a `401` [`TaggedError`] with its own [`Tag`], so an
//! application can render, say, expired tokens differently from missing ones.
//! Without a custom error handler the fallback answers with the tag's message.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::debug;

use http::StatusCode;
use http::header::AUTHORIZATION;

use crate::error::{BoxError, Tag, TaggedError};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

pub static JWT_MISSING: Tag = Tag::new(StatusCode::UNAUTHORIZED, "JWT token is missing");
pub static JWT_INVALID_FORMAT: Tag = Tag::new(StatusCode::UNAUTHORIZED, "Invalid JWT format");
pub static JWT_INVALID: Tag = Tag::new(StatusCode::UNAUTHORIZED, "Invalid JWT token");
pub static JWT_EXPIRED: Tag = Tag::new(StatusCode::UNAUTHORIZED, "JWT token has expired");
pub static JWT_INVALID_SIGNATURE: Tag = Tag::new(StatusCode::UNAUTHORIZED, "JWT signature is invalid");
pub static JWT_INVALID_SIGNING_METHOD: Tag =
    Tag::new(StatusCode::UNAUTHORIZED, "Invalid JWT signing method");

const BEARER: &str = "Bearer ";

/// The validated token's claims.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Claims(pub Map<String, Value>);

impl Claims {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The `sub` claim, when it is a string.
    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }
}

/// Claims stored by [`JwtAuth`] with the default context setter.
pub fn claims(req: &Request) -> Option<&Claims> {
    req.context::<Claims>()
}

type HeaderFn = Box<dyn Fn(&Request) -> Option<String> + Send + Sync>;
type ExtraClaimsFn = Box<dyn Fn(&Request) -> Option<Claims> + Send + Sync>;
type SetContextFn = Box<dyn Fn(&mut Request, Claims) + Send + Sync>;

/// Configuration for [`JwtAuth`].
///
/// Only the key and validation rules are required. The hooks default to
/// reading `Authorization`, adding no extra claims, and storing [`Claims`]
/// in the request context.
pub struct JwtOptions {
    key: DecodingKey,
    validation: Validation,
    get_header: HeaderFn,
    get_claims: Option<ExtraClaimsFn>,
    set_context: SetContextFn,
}

impl JwtOptions {
    pub fn new(key: DecodingKey, validation: Validation) -> Self {
        Self {
            key,
            validation,
            get_header: Box::new(|req| req.header(AUTHORIZATION).map(str::to_owned)),
            get_claims: None,
            set_context: Box::new(|req, claims| {
                req.set_context(claims);
            }),
        }
    }

    /// HS256 with a shared secret; `exp` is required.
    pub fn hmac(secret: &[u8]) -> Self {
        Self::new(DecodingKey::from_secret(secret), Validation::new(Algorithm::HS256))
    }

    /// Where to read the `Bearer <token>` value from.
    pub fn get_header<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Option<String> + Send + Sync + 'static,
    {
        self.get_header = Box::new(f);
        self
    }

    /// Claims merged over the token's own after validation.
    pub fn get_claims<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Option<Claims> + Send + Sync + 'static,
    {
        self.get_claims = Some(Box::new(f));
        self
    }

    /// Where validated claims go. Replacing this makes [`claims`] return `None`
    /// unless the new setter stores [`Claims`] itself.
    pub fn set_context<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Request, Claims) + Send + Sync + 'static,
    {
        self.set_context = Box::new(f);
        self
    }
}

/// The authentication middleware. Requests without a valid token never reach
/// the handler.
pub struct JwtAuth {
    options: JwtOptions,
}

impl JwtAuth {
    pub fn new(options: JwtOptions) -> Self {
        Self { options }
    }

    fn authenticate(&self, req: &Request) -> Result<Claims, TaggedError> {
        let header = (self.options.get_header)(req)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| JWT_MISSING.error())?;
        let token = header.strip_prefix(BEARER).ok_or_else(|| JWT_INVALID_FORMAT.error())?;

        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &self.options.key, &self.options.validation)
            .map_err(classify)?;

        let mut claims = Claims(data.claims);
        if let Some(extra) = self.options.get_claims.as_ref().and_then(|f| f(req)) {
            claims.0.extend(extra.0);
        }
        Ok(claims)
    }
}

impl Middleware for JwtAuth {
    fn call(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
        let claims = self.authenticate(req).inspect_err(|err| {
            debug!(path = %req.path(), reason = %err, "jwt rejected");
        })?;
        (self.options.set_context)(req, claims);
        next.run(req, res)
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TaggedError {
    let tag = match err.kind() {
        ErrorKind::ExpiredSignature => &JWT_EXPIRED,
        ErrorKind::InvalidSignature => &JWT_INVALID_SIGNATURE,
        ErrorKind::InvalidAlgorithm => &JWT_INVALID_SIGNING_METHOD,
        _ => &JWT_INVALID,
    };
    tag.wrap(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::middleware::BoxedMiddleware;
    use bytes::Bytes;
    use jsonwebtoken::{EncodingKey, Header, get_current_timestamp};
    use serde_json::json;
    use std::sync::Arc;

    const SECRET: &[u8] = b"jwt-test-secret-key";

    fn token(algorithm: Algorithm, secret: &[u8], exp: u64) -> String {
        let claims = json!({ "sub": "user1", "exp": exp });
        jsonwebtoken::encode(&Header::new(algorithm), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn valid_token() -> String {
        token(Algorithm::HS256, SECRET, get_current_timestamp() + 3600)
    }

    fn echo_subject(req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
        let subject = claims(req).and_then(Claims::subject).unwrap_or("none").to_owned();
        res.write(subject);
        Ok(())
    }

    fn run(auth: JwtAuth, authorization: Option<&str>) -> (Result<(), BoxError>, Response) {
        let mut builder = http::Request::builder().uri("/test-jwt");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let mut req: Request = builder.body(Bytes::new()).unwrap().into();

        let chain: [BoxedMiddleware; 1] = [Arc::new(auth)];
        let handler: &dyn Handler = &echo_subject;
        let mut res = Response::new();
        let result = Next::new(&chain, handler).run(&mut req, &mut res);
        (result, res)
    }

    fn rejected_with(result: Result<(), BoxError>, tag: &'static Tag) -> bool {
        result.is_err_and(|err| tag.matches(err.as_ref()))
    }

    #[test]
    fn valid_token_exposes_claims() {
        let (result, res) = run(JwtAuth::new(JwtOptions::hmac(SECRET)), Some(&format!("Bearer {}", valid_token())));
        assert!(result.is_ok());
        assert_eq!(res.body(), b"user1");
    }

    #[test]
    fn missing_header() {
        let (result, res) = run(JwtAuth::new(JwtOptions::hmac(SECRET)), None);
        assert!(rejected_with(result, &JWT_MISSING));
        assert!(res.body().is_empty());
    }

    #[test]
    fn missing_bearer_prefix() {
        let (result, _) = run(JwtAuth::new(JwtOptions::hmac(SECRET)), Some("invalid-token"));
        assert!(rejected_with(result, &JWT_INVALID_FORMAT));
    }

    #[test]
    fn expired_token() {
        let expired = token(Algorithm::HS256, SECRET, get_current_timestamp() - 3600);
        let (result, _) = run(JwtAuth::new(JwtOptions::hmac(SECRET)), Some(&format!("Bearer {expired}")));
        assert!(rejected_with(result, &JWT_EXPIRED));
    }

    #[test]
    fn wrong_secret() {
        let forged = token(Algorithm::HS256, b"another-secret", get_current_timestamp() + 3600);
        let (result, _) = run(JwtAuth::new(JwtOptions::hmac(SECRET)), Some(&format!("Bearer {forged}")));
        assert!(rejected_with(result, &JWT_INVALID_SIGNATURE));
    }

    #[test]
    fn wrong_algorithm() {
        let other = token(Algorithm::HS384, SECRET, get_current_timestamp() + 3600);
        let (result, _) = run(JwtAuth::new(JwtOptions::hmac(SECRET)), Some(&format!("Bearer {other}")));
        assert!(rejected_with(result, &JWT_INVALID_SIGNING_METHOD));
    }

    #[test]
    fn garbage_token() {
        let (result, _) = run(JwtAuth::new(JwtOptions::hmac(SECRET)), Some("Bearer not.a.jwt"));
        assert!(rejected_with(result, &JWT_INVALID));
    }

    #[test]
    fn extra_claims_override_token_claims() {
        let options = JwtOptions::hmac(SECRET).get_claims(|_| {
            let mut extra = Map::new();
            extra.insert("sub".into(), Value::from("impersonated"));
            Some(Claims(extra))
        });
        let (result, res) = run(JwtAuth::new(options), Some(&format!("Bearer {}", valid_token())));
        assert!(result.is_ok());
        assert_eq!(res.body(), b"impersonated");
    }

    #[test]
    fn custom_header_source() {
        let options = JwtOptions::hmac(SECRET)
            .get_header(|req| req.header("x-token").map(|t| format!("Bearer {t}")));
        let mut req: Request = http::Request::builder()
            .header("x-token", valid_token())
            .body(Bytes::new())
            .unwrap()
            .into();

        let chain: [BoxedMiddleware; 1] = [Arc::new(JwtAuth::new(options))];
        let handler: &dyn Handler = &echo_subject;
        let mut res = Response::new();
        assert!(Next::new(&chain, handler).run(&mut req, &mut res).is_ok());
        assert_eq!(res.body(), b"user1");
    }
}
