use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    error::ApiError,
    extract::{parse_iso_date, ValidPath, ValidatedJson},
    profiles::{
        dto::{CreateProfileRequest, ProfileDto, UpdateProfileRequest},
        repo::{NewProfile, Profile, ProfilePatch, ProfileRepoError},
    },
    response::success,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/users/:id/profile",
        get(get_profile).post(create_profile).put(update_profile),
    )
}

fn repo_error(e: ProfileRepoError) -> ApiError {
    match e {
        ProfileRepoError::UserNotFound => ApiError::NotFound("User not found".into()),
        ProfileRepoError::AlreadyExists => ApiError::Conflict("Profile already exists".into()),
        ProfileRepoError::NotFound => ApiError::NotFound("Profile not found".into()),
        ProfileRepoError::Db(e) => ApiError::Internal(e.into()),
    }
}

/// GET /api/users/:id/profile
#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    ValidPath(user_id): ValidPath<Uuid>,
) -> Result<Response, ApiError> {
    let profile = Profile::get_by_user_id(&state.db, user_id)
        .await
        .map_err(repo_error)?
        .ok_or_else(|| ApiError::NotFound("Profile not found".into()))?;
    Ok(success(StatusCode::OK, ProfileDto::from(profile)))
}

/// POST /api/users/:id/profile
#[instrument(skip(state, payload))]
pub async fn create_profile(
    State(state): State<AppState>,
    ValidPath(user_id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<CreateProfileRequest>,
) -> Result<Response, ApiError> {
    // Validation has already vetted the date string; re-parsing cannot fail.
    let birthdate = payload.birthdate.as_deref().and_then(parse_iso_date);
    let profile = Profile::create(
        &state.db,
        user_id,
        NewProfile {
            bio: payload.bio,
            location: payload.location,
            birthdate,
            website: payload.website,
        },
    )
    .await
    .map_err(repo_error)?;

    info!(user_id = %user_id, "profile created");
    Ok(success(StatusCode::CREATED, ProfileDto::from(profile)))
}

/// PUT /api/users/:id/profile
#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    ValidPath(user_id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateProfileRequest>,
) -> Result<Response, ApiError> {
    if payload.is_empty() {
        return Err(ApiError::validation("No fields to update", None));
    }

    let birthdate = payload
        .birthdate
        .map(|opt| opt.as_deref().and_then(parse_iso_date));
    let patch = ProfilePatch {
        bio: payload.bio,
        location: payload.location,
        birthdate,
        website: payload.website,
    };

    let profile = Profile::update(&state.db, user_id, patch)
        .await
        .map_err(repo_error)?;

    info!(user_id = %user_id, "profile updated");
    Ok(success(StatusCode::OK, ProfileDto::from(profile)))
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
    async fn profile_routes_reject_malformed_ids() {
        let res = app()
            .oneshot(
                Request::get("/api/users/42/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["error"]["message"], "Invalid id");
    }

    #[tokio::test]
    async fn create_profile_rejects_bad_birthdate() {
        let res = app()
            .oneshot(
                Request::post(format!("/api/users/{}/profile", Uuid::new_v4()))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"birthdate":"someday"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn empty_profile_update_is_a_validation_error() {
        let res = app()
            .oneshot(
                Request::put(format!("/api/users/{}/profile", Uuid::new_v4()))
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

    #[test]
    fn repo_errors_map_to_http_statuses() {
        use axum::response::IntoResponse;
        let missing_user = repo_error(ProfileRepoError::UserNotFound).into_response();
        assert_eq!(missing_user.status(), StatusCode::NOT_FOUND);
        let exists = repo_error(ProfileRepoError::AlreadyExists).into_response();
        assert_eq!(exists.status(), StatusCode::CONFLICT);
        let missing = repo_error(ProfileRepoError::NotFound).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
