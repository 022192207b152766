//! Administrator sign-in, carried in a signed and encrypted session cookie.

use std::fmt;
use std::future::{ready, Ready};

use actix_session::config::PersistentSession;
use actix_session::storage::CookieSessionStore;
use actix_session::{Session, SessionExt, SessionMiddleware};
use actix_web::cookie::{time::Duration, Key};
use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;

const SESSION_USER: &str = "admin_user";
const SESSION_COOKIE: &str = "futsal_session";
const SESSION_DAYS: i64 = 7;

#[derive(Clone)]
pub struct AdminCredentials {
    email: String,
    password: String,
}

impl AdminCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Emails compare case-insensitively, passwords exactly.
    pub fn verify(&self, email: &str, password: &str) -> bool {
        email.trim().eq_ignore_ascii_case(&self.email) && password == self.password
    }
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The signed-in administrator. Extracting it from a request without a
/// session fails with [`AppError::Unauthorized`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub email: String,
}

pub fn sign_in(session: &Session, credentials: &AdminCredentials, login: &LoginRequest) -> Result<AdminUser, AppError> {
    if !credentials.verify(&login.email, &login.password) {
        warn!(email = %login.email.trim(), "rejected admin sign-in");
        return Err(AppError::InvalidCredentials);
    }
    let user = AdminUser {
        email: credentials.email().to_string(),
    };
    session.renew();
    session
        .insert(SESSION_USER, &user)
        .map_err(|e| AppError::Session(e.to_string()))?;
    info!(email = %user.email, "admin signed in");
    Ok(user)
}

pub fn sign_out(session: &Session) {
    session.purge();
}

pub fn current_admin(session: &Session) -> Result<Option<AdminUser>, AppError> {
    session
        .get::<AdminUser>(SESSION_USER)
        .map_err(|e| AppError::Session(e.to_string()))
}

impl FromRequest for AdminUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let session = req.get_session();
        ready(current_admin(&session).and_then(|user| user.ok_or(AppError::Unauthorized)))
    }
}

/// HTTP-only cookie on `/`, kept for a week, `Secure` when `secure` is set.
pub fn session_middleware(key: Key, secure: bool) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name(SESSION_COOKIE.to_string())
        .cookie_secure(secure)
        .cookie_http_only(true)
        .cookie_path("/".to_string())
        .session_lifecycle(PersistentSession::default().session_ttl(Duration::days(SESSION_DAYS)))
        .build()
}
