use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware,
    response::Response,
    routing::{get, post},
    Router,
};
use axum_extra::extract::CookieJar;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        cookie::{clear_refresh_cookie, refresh_cookie, REFRESH_COOKIE},
        csrf::{csrf_cookie, mint_csrf_token, require_csrf},
        dto::{LoginRequest, TokenResponse},
        password::verify_password,
    },
    error::ApiError,
    extract::ValidatedJson,
    response::{success, success_empty},
    state::AppState,
    users::repo::UserStore as _,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route_layer(middleware::from_fn(require_csrf))
        .route("/auth/login", post(login))
        .route("/auth/csrf", get(issue_csrf))
}

/// POST /api/auth/login
///
/// Unknown e-mail and wrong password produce the same 401 so responses do
/// not reveal which accounts exist.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Response), ApiError> {
    let user = match state.users.find_by_email(&payload.email).await {
        Ok(Some(u)) => Some(u),
        Ok(None) => None,
        Err(e) => return Err(ApiError::Internal(e.into())),
    };

    let verified = match &user {
        Some(u) => verify_password(&payload.password, &u.password_hash)?,
        None => false,
    };
    let Some(user) = user.filter(|_| verified) else {
        warn!(email = %payload.email, "login rejected");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    let access = state.jwt.sign_access(user.id, None)?;
    let (refresh, _rot) = state.jwt.sign_refresh(user.id)?;

    info!(user_id = %user.id, "user logged in");
    Ok((
        jar.add(refresh_cookie(refresh)),
        success(StatusCode::OK, TokenResponse { access_token: access }),
    ))
}

/// POST /api/auth/refresh (CSRF-guarded)
///
/// Verifies the refresh cookie and reissues both tokens; the new cookie
/// carries a fresh rotation id, so the old value is never issued again.
#[instrument(skip(state, jar))]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), ApiError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("No refresh"))?;

    let claims = state.jwt.verify_refresh(&token).map_err(|_| {
        warn!("refresh token rejected");
        ApiError::unauthorized("Invalid refresh")
    })?;

    let access = state.jwt.sign_access(claims.sub, None)?;
    let (new_refresh, _rot) = state.jwt.sign_refresh(claims.sub)?;

    info!(user_id = %claims.sub, "tokens rotated");
    Ok((
        jar.add(refresh_cookie(new_refresh)),
        success(StatusCode::OK, TokenResponse { access_token: access }),
    ))
}

/// POST /api/auth/logout (CSRF-guarded)
///
/// Idempotent: clears the cookie whether or not a session existed.
#[instrument(skip(jar))]
pub async fn logout(jar: CookieJar) -> (CookieJar, Response) {
    (
        jar.add(clear_refresh_cookie()),
        success_empty(StatusCode::OK),
    )
}

/// GET /api/auth/csrf
///
/// Issues the double-submit token as a readable cookie and echoes it in a
/// header so same-origin scripts need not parse cookies.
#[instrument(skip(jar))]
pub async fn issue_csrf(jar: CookieJar) -> Result<(CookieJar, HeaderMap, Response), ApiError> {
    let token = mint_csrf_token();
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-csrf-token"),
        HeaderValue::from_str(&token)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("csrf header value: {e}")))?,
    );
    Ok((
        jar.add(csrf_cookie(token)),
        headers,
        success_empty(StatusCode::OK),
    ))
}
