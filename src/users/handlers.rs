use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{extractors::AuthUser, password::hash_password},
    error::ApiError,
    extract::{parse_iso_date, ValidPath, ValidQuery, ValidatedJson},
    response::{success, success_empty},
    state::AppState,
    users::{
        dto::{CreateUserRequest, ListUsersQuery, UpdateUserRequest, UserDto, UserListPage},
        repo::{NewUser, User, UserListFilter, UserPatch, UserRepoError, UserStore as _},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/me", get(get_me))
}

fn repo_error(e: UserRepoError) -> ApiError {
    match e {
        UserRepoError::Duplicate(field) => ApiError::Conflict(format!("{field} already in use")),
        UserRepoError::NotFound => ApiError::NotFound("User not found".into()),
        UserRepoError::InvalidCursor => ApiError::validation("Invalid cursor", None),
        UserRepoError::Db(e) => ApiError::Internal(e.into()),
    }
}

/// GET /api/users
///
/// Without a query string, returns the plain array. Any query string
/// switches to the filtered, cursor-paginated shape
/// `{items, nextCursor, limit}`.
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
    ValidQuery(query): ValidQuery<ListUsersQuery>,
) -> Result<Response, ApiError> {
    if raw.is_none() {
        let users = User::list(&state.db).await.map_err(repo_error)?;
        let dtos: Vec<UserDto> = users.into_iter().map(UserDto::from).collect();
        return Ok(success(StatusCode::OK, dtos));
    }

    // Validation has already vetted the date strings; re-parsing cannot fail.
    let midnight_utc =
        |s: &str| parse_iso_date(s).map(|d| d.midnight().assume_utc());
    let limit = query.limit;
    let page = User::list_page(
        &state.db,
        UserListFilter {
            limit,
            cursor: query.cursor,
            user_id: query.user_id,
            q: query.q,
            before: query.before.as_deref().and_then(midnight_utc),
            after: query.after.as_deref().and_then(midnight_utc),
        },
    )
    .await
    .map_err(repo_error)?;

    Ok(success(
        StatusCode::OK,
        UserListPage {
            items: page.items.into_iter().map(UserDto::from).collect(),
            next_cursor: page.next_cursor,
            limit,
        },
    ))
}

/// GET /api/users/:id
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Response, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await
        .map_err(repo_error)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(success(StatusCode::OK, UserDto::from(user)))
}

/// POST /api/users
#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<Response, ApiError> {
    let password_hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        NewUser {
            username: &payload.username,
            email: &payload.email,
            password_hash: &password_hash,
            display_name: payload.display_name.as_deref(),
            avatar_url: payload.avatar_url.as_deref(),
        },
    )
    .await
    .map_err(repo_error)?;

    info!(user_id = %user.id, "user created");
    Ok(success(StatusCode::CREATED, UserDto::from(user)))
}

/// PUT /api/users/:id
///
/// Sparse body: absent fields keep their value, explicit nulls clear the
/// nullable ones. A body with nothing to apply is a validation error.
#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<Response, ApiError> {
    if payload.is_empty() {
        return Err(ApiError::validation("No fields to update", None));
    }

    let password_hash = match &payload.password {
        Some(pw) => Some(hash_password(pw)?),
        None => None,
    };
    let patch = UserPatch {
        username: payload.username,
        email: payload.email,
        password_hash,
        display_name: payload.display_name,
        avatar_url: payload.avatar_url,
    };

    let user = User::update(&state.db, id, patch)
        .await
        .map_err(repo_error)?;

    info!(user_id = %user.id, "user updated");
    Ok(success(StatusCode::OK, UserDto::from(user)))
}

/// DELETE /api/users/:id
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> Result<Response, ApiError> {
    let deleted = User::delete(&state.db, id).await.map_err(repo_error)?;
    if !deleted {
        return Err(ApiError::NotFound("User not found".into()));
    }
    info!(user_id = %id, "user deleted");
    Ok(success_empty(StatusCode::OK))
}

/// GET /api/me
///
/// The token may outlive the account; a valid token whose subject no
/// longer exists is treated as unauthorized, not as a missing resource.
#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(repo_error)?
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
    Ok(success(StatusCode::OK, UserDto::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::util::ServiceExt;

    fn app() -> Router {
        Router::new()
            .nest("/api", router())
            .with_state(AppState::fake())
    }

    async fn body_json(res: axum::http::Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn get_user_rejects_malformed_id() {
        let res = app()
            .oneshot(
                Request::get("/api/users/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["message"], "Invalid id");
    }

    #[tokio::test]
    async fn create_user_rejects_invalid_body() {
        let res = app()
            .oneshot(
                Request::post("/api/users")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"username":"x","email":"nope","password":"short"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["status"], "error");
        assert!(json["error"]["details"].is_object() || json["error"]["details"].is_string());
    }

    #[tokio::test]
    async fn empty_update_is_a_validation_error() {
        let res = app()
            .oneshot(
                Request::put(format!("/api/users/{}", Uuid::new_v4()))
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["error"]["message"], "No fields to update");
    }

    #[tokio::test]
    async fn me_requires_a_token() {
        let res = app()
            .oneshot(Request::get("/api/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_returns_the_token_subject() {
        use crate::users::repo::test_store::{user_fixture, InMemoryUsers};
        use std::sync::Arc;

        let user = user_fixture("a@x.com", "irrelevant");
        let user_id = user.id;
        let state = AppState::fake_with_users(Arc::new(InMemoryUsers::with_user(user)));
        let token = state.jwt.sign_access(user_id, None).unwrap();

        let res = Router::new()
            .nest("/api", router())
            .with_state(state)
            .oneshot(
                Request::get("/api/me")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["data"]["id"], user_id.to_string());
        assert_eq!(json["data"]["email"], "a@x.com");
    }

    #[tokio::test]
    async fn me_with_token_for_deleted_user_is_unauthorized() {
        use crate::users::repo::test_store::InMemoryUsers;
        use std::sync::Arc;

        let state = AppState::fake_with_users(Arc::new(InMemoryUsers::default()));
        let token = state.jwt.sign_access(Uuid::new_v4(), None).unwrap();

        let res = Router::new()
            .nest("/api", router())
            .with_state(state)
            .oneshot(
                Request::get("/api/me")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn list_with_malformed_limit_gets_enveloped_400() {
        let res = app()
            .oneshot(
                Request::get("/api/users?limit=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["message"], "Validation failed");
        assert!(json["error"]["details"]["query"].is_string());
    }

    #[tokio::test]
    async fn list_rejects_out_of_range_query_values() {
        for query in ["limit=0", "limit=500", "q=", "before=soon", "cursor=42"] {
            let res = app()
                .oneshot(
                    Request::get(format!("/api/users?{query}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(
                res.status(),
                StatusCode::BAD_REQUEST,
                "query {query:?} should be rejected"
            );
            let json = body_json(res).await;
            assert_eq!(json["status"], "error");
        }
    }

    #[test]
    fn repo_errors_map_to_http_statuses() {
        use axum::response::IntoResponse;
        let conflict = repo_error(UserRepoError::Duplicate("email")).into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        let missing = repo_error(UserRepoError::NotFound).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let cursor = repo_error(UserRepoError::InvalidCursor).into_response();
        assert_eq!(cursor.status(), StatusCode::BAD_REQUEST);
        let db = repo_error(UserRepoError::Db(sqlx::Error::PoolTimedOut)).into_response();
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
