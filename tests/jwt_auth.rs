//! Bearer-token authentication in front of a JSON endpoint.

use brook::middleware::body_encoder::json_body_encoder;
use brook::middleware::jwt::{self, JwtAuth, JwtOptions};
use brook::{BoxError, Request, Response, Router};
use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{Method, StatusCode};
use jsonwebtoken::{Algorithm, EncodingKey, Header, get_current_timestamp};
use serde_json::{Value, json};

const SECRET: &[u8] = b"jwt-test-secret-key";

fn create_token(subject: &str, exp: u64) -> String {
    let claims = json!({ "sub": subject, "exp": exp });
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

fn query(req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
    let subject = jwt::claims(req).and_then(|c| c.subject()).unwrap_or_default().to_owned();
    res.encode(&json!({ "status": "success", "user": subject }))
}

fn app() -> Router {
    Router::new()
        .middleware(json_body_encoder)
        .middleware(JwtAuth::new(JwtOptions::hmac(SECRET)))
        .on(Method::GET, "/test-jwt", query)
}

fn get(app: &Router, authorization: Option<&str>) -> http::Response<Bytes> {
    let mut builder = http::Request::builder().uri("/test-jwt");
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    app.serve(builder.body(Bytes::new()).unwrap())
}

#[test]
fn valid_token() {
    let token = create_token("user1", get_current_timestamp() + 3600);
    let res = get(&app(), Some(&format!("Bearer {token}")));

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body, json!({ "status": "success", "user": "user1" }));
}

#[test]
fn missing_token() {
    let res = get(&app(), None);
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.body().as_ref(), b"JWT token is missing");
}

#[test]
fn invalid_token_format() {
    let res = get(&app(), Some("invalid-token"));
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.body().as_ref(), b"Invalid JWT format");
}

#[test]
fn expired_token() {
    let token = create_token("user1", get_current_timestamp() - 3600);
    let res = get(&app(), Some(&format!("Bearer {token}")));

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.body().as_ref(), b"JWT token has expired");
}

#[test]
fn unauthenticated_requests_still_get_404() {
    let res = app().serve(http::Request::get("/elsewhere").body(Bytes::new()).unwrap());
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
