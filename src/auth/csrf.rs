//! Double-submit CSRF protection. The token lives in a cookie readable by
//! page script and must be echoed back in a request header; only a page that
//! can read both proves same-origin.

use std::fmt::Write as _;

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::RngCore;
use tracing::warn;

use crate::error::ApiError;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

const CSRF_TOKEN_BYTES: usize = 24;

pub fn mint_csrf_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let mut out = String::with_capacity(CSRF_TOKEN_BYTES * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// `httpOnly=false` on purpose: the client script reads this cookie (or the
/// response header) and echoes it in `x-csrf-token`.
pub fn csrf_cookie(token: String) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE, token))
        .http_only(false)
        .secure(true)
        .same_site(SameSite::Strict)
        .path("/")
        .build()
}

/// Middleware for state-changing auth routes (refresh, logout). Passes only
/// when cookie and header are both present and byte-equal.
pub async fn require_csrf(
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let cookie = jar.get(CSRF_COOKIE).map(|c| c.value().to_string());
    let header = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    match (cookie, header) {
        (Some(cookie), Some(header)) if cookie == header => Ok(next.run(req).await),
        _ => {
            warn!("csrf validation failed");
            Err(ApiError::Forbidden("CSRF validation failed".into()))
        }
    }
}
