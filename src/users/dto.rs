use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::extract::Sanitize;
use crate::users::repo::User;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-zA-Z0-9._-]+$").unwrap();
}

/// Distinguishes an omitted field from an explicit `null` in partial
/// updates: `None` = leave unchanged, `Some(None)` = clear,
/// `Some(Some(v))` = set.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 30), regex = "USERNAME_RE")]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 80))]
    pub display_name: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
}

impl Sanitize for CreateUserRequest {
    fn sanitize(&mut self) {
        self.email = self.email.trim().to_lowercase();
        if let Some(url) = &mut self.avatar_url {
            *url = url.trim().to_string();
        }
    }
}

/// Sparse update body: only present fields are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub display_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.display_name.is_none()
            && self.avatar_url.is_none()
    }
}

impl Sanitize for UpdateUserRequest {
    fn sanitize(&mut self) {
        if let Some(email) = &mut self.email {
            *email = email.trim().to_lowercase();
        }
        if let Some(Some(url)) = &mut self.avatar_url {
            *url = url.trim().to_string();
        }
    }
}

// Derived validation cannot see through the double Option, so the sparse
// body validates by hand against the same constraints as create.
impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(username) = &self.username {
            let chars = username.chars().count();
            if !(3..=30).contains(&chars) || !USERNAME_RE.is_match(username) {
                errors.add("username", ValidationError::new("username"));
            }
        }
        if let Some(email) = &self.email {
            if !validator::validate_email(email) {
                errors.add("email", ValidationError::new("email"));
            }
        }
        if let Some(password) = &self.password {
            let chars = password.chars().count();
            if !(8..=128).contains(&chars) {
                errors.add("password", ValidationError::new("length"));
            }
        }
        if let Some(Some(name)) = &self.display_name {
            let chars = name.chars().count();
            if !(1..=80).contains(&chars) {
                errors.add("displayName", ValidationError::new("length"));
            }
        }
        if let Some(Some(url)) = &self.avatar_url {
            if !validator::validate_url(url) {
                errors.add("avatarUrl", ValidationError::new("url"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Public shape of a user; the password hash never leaves the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            display_name: u.display_name,
            avatar_url: u.avatar_url,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Query parameters for the paginated list: free-text search, id and
/// creation-date filters, and keyset pagination driven by an opaque cursor
/// (the id of the last item of the previous page).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
    pub cursor: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 80))]
    pub q: Option<String>,
    #[validate(custom = "validate_iso_date")]
    pub before: Option<String>,
    #[validate(custom = "validate_iso_date")]
    pub after: Option<String>,
}

impl Default for ListUsersQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            cursor: None,
            user_id: None,
            q: None,
            before: None,
            after: None,
        }
    }
}

impl Sanitize for ListUsersQuery {
    fn sanitize(&mut self) {
        if let Some(q) = &mut self.q {
            *q = q.trim().to_string();
        }
    }
}

fn validate_iso_date(s: &str) -> Result<(), ValidationError> {
    crate::extract::parse_iso_date(s)
        .map(|_| ())
        .ok_or_else(|| ValidationError::new("date"))
}

fn default_limit() -> i64 {
    20
}

/// Paginated list body: `nextCursor` is null once the last page is reached.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListPage {
    pub items: Vec<UserDto>,
    pub next_cursor: Option<Uuid>,
    pub limit: i64,
}
