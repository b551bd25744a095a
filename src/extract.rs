use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::json;
use time::{macros::format_description, Date};
use tracing::warn;
use validator::Validate;

use crate::error::ApiError;

lazy_static! {
    static ref ISO_DATE_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

/// Parses a `YYYY-MM-DD` field into a calendar date; the regex alone would
/// admit days like `2020-02-31`.
pub fn parse_iso_date(s: &str) -> Option<Date> {
    if !ISO_DATE_RE.is_match(s) {
        return None;
    }
    Date::parse(s, format_description!("[year]-[month]-[day]")).ok()
}

/// Canonicalization hook run before validation, so handlers only ever see
/// normalized data (lower-cased trimmed e-mails, trimmed URLs).
pub trait Sanitize {
    fn sanitize(&mut self) {}
}

/// JSON body extractor that sanitizes and schema-validates before the
/// handler runs. Failure short-circuits with a 400 envelope carrying the
/// issue list.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Sanitize,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| {
                warn!(error = %e, "body rejected");
                ApiError::validation("Validation failed", Some(json!({ "body": e.body_text() })))
            })?;

        value.sanitize();
        value.validate().map_err(|e| {
            warn!(issues = %e, "validation failed");
            ApiError::validation("Validation failed", serde_json::to_value(&e).ok())
        })?;

        Ok(ValidatedJson(value))
    }
}

/// Query-string counterpart of `ValidatedJson`: deserializes, sanitizes and
/// validates, so a malformed query gets the same 400 envelope as a bad body.
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Sanitize,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(mut value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                warn!(error = %e, "query rejected");
                ApiError::validation("Validation failed", Some(json!({ "query": e.body_text() })))
            })?;

        value.sanitize();
        value.validate().map_err(|e| {
            warn!(issues = %e, "query validation failed");
            ApiError::validation("Validation failed", serde_json::to_value(&e).ok())
        })?;

        Ok(ValidQuery(value))
    }
}

/// Path extractor returning the same 400 envelope as body validation when a
/// parameter (typically a UUID) does not parse.
pub struct ValidPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                ApiError::validation("Invalid id", Some(json!({ "params": e.body_text() })))
            })?;
        Ok(ValidPath(value))
    }
}
