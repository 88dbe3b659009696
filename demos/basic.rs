//! User registration and login over JSON or XML, with a JWT-protected profile.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -X POST http://localhost:3000/register \
//!        -H 'content-type: application/json' \
//!        -d '{"username":"alice","email":"alice@example.com","password":"pw"}'
//!   curl -X POST http://localhost:3000/login \
//!        -H 'content-type: application/json' \
//!        -d '{"email":"alice@example.com","password":"pw"}'
//!   curl http://localhost:3000/me -H "authorization: Bearer <token from /login>"
//!
//! The address defaults to 0.0.0.0:3000; set BROOK_ADDR to override it.

use std::sync::{Arc, Mutex};

use brook::middleware::body_encoder::{json_body_encoder, xml_body_encoder};
use brook::middleware::body_parser::{json_body_parser, xml_body_parser};
use brook::middleware::jwt::{self, JwtAuth, JwtOptions};
use brook::middleware::trace::trace_request;
use brook::{
    BoxError, Handler, Middleware, Next, Request, Response, Router, Server, Tag, TaggedError, normalize_path,
};
use http::StatusCode;
use jsonwebtoken::{EncodingKey, Header, get_current_timestamp};
use serde::{Deserialize, Serialize};

const SECRET: &[u8] = b"change-me";

static BAD_CREDENTIALS: Tag = Tag::new(StatusCode::UNAUTHORIZED, "Credentials are invalid");

#[derive(Clone)]
struct User {
    id: u64,
    username: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct Users(Vec<User>);

type SharedUsers = Arc<Mutex<Users>>;

#[derive(Default, Deserialize)]
#[serde(default)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct UserView {
    id: u64,
    username: String,
    email: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
}

fn bad_request(err: impl Into<BoxError>) -> TaggedError {
    TaggedError::wrap(StatusCode::BAD_REQUEST, err)
}

struct Register(SharedUsers);

impl Handler for Register {
    fn call(&self, req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
        let input: RegisterRequest = req.parse_body_into().map_err(bad_request)?;
        if input.username.is_empty() || input.email.is_empty() || input.password.is_empty() {
            return Err(TaggedError::new(StatusCode::BAD_REQUEST, "Registration's format incorrect.").into());
        }

        let mut users = self.0.lock().map_err(|_| "user store poisoned")?;
        if users.0.iter().any(|u| u.email == input.email) {
            return Err(TaggedError::new(StatusCode::BAD_REQUEST, "Duplicate email").into());
        }
        let user = User {
            id: users.0.len() as u64 + 1,
            username: input.username,
            email: input.email,
            password: input.password,
        };
        users.0.push(user.clone());

        res.write_status(StatusCode::CREATED);
        res.encode(&UserView { id: user.id, username: user.username, email: user.email })
    }
}

struct Login(SharedUsers);

impl Handler for Login {
    fn call(&self, req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
        let input: LoginRequest = req.parse_body_into().map_err(bad_request)?;

        let users = self.0.lock().map_err(|_| "user store poisoned")?;
        let user = users
            .0
            .iter()
            .find(|u| u.email == input.email && u.password == input.password)
            .ok_or_else(|| BAD_CREDENTIALS.error())?;

        let claims = serde_json::json!({
            "sub": user.id.to_string(),
            "name": user.username,
            "exp": get_current_timestamp() + 3600,
        });
        let token = jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))?;
        res.encode(&LoginResponse { token })
    }
}

fn me(req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
    let claims = jwt::claims(req).cloned().unwrap_or_default();
    res.encode(&claims.0)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let addr = std::env::var("BROOK_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_owned());
    let users = SharedUsers::default();

    let app = Router::new()
        .middleware(trace_request)
        .middleware(json_body_parser)
        .middleware(xml_body_parser)
        .middleware(json_body_encoder)
        .middleware(xml_body_encoder);

    // JwtAuth guards every route it is registered on, so scope it to /me.
    let auth = JwtAuth::new(JwtOptions::hmac(SECRET));
    let app = app.middleware(move |req: &mut Request, res: &mut Response, next: Next<'_>| -> Result<(), BoxError> {
        if normalize_path(req.path()) == "me" {
            auth.call(req, res, next)
        } else {
            next.run(req, res)
        }
    });

    let app = app
        .post("/register", Register(Arc::clone(&users)))
        .post("/login", Login(Arc::clone(&users)))
        .get("/me", me);

    Server::bind(&addr).serve(app).await.expect("server error");
}
