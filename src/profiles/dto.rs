use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::extract::{parse_iso_date, Sanitize};
use crate::profiles::repo::Profile;
use crate::users::dto::double_option;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    #[validate(length(max = 280))]
    pub bio: Option<String>,
    #[validate(length(max = 80))]
    pub location: Option<String>,
    #[validate(custom = "validate_birthdate")]
    pub birthdate: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
}

fn validate_birthdate(s: &str) -> Result<(), ValidationError> {
    parse_iso_date(s)
        .map(|_| ())
        .ok_or_else(|| ValidationError::new("birthdate"))
}

impl Sanitize for CreateProfileRequest {
    fn sanitize(&mut self) {
        if let Some(url) = &mut self.website {
            *url = url.trim().to_string();
        }
    }
}

/// Sparse profile update; every field is nullable, so each one is a double
/// Option distinguishing absent from an explicit clear.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub birthdate: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub website: Option<Option<String>>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.bio.is_none()
            && self.location.is_none()
            && self.birthdate.is_none()
            && self.website.is_none()
    }
}

impl Sanitize for UpdateProfileRequest {
    fn sanitize(&mut self) {
        if let Some(Some(url)) = &mut self.website {
            *url = url.trim().to_string();
        }
    }
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(Some(bio)) = &self.bio {
            if bio.chars().count() > 280 {
                errors.add("bio", ValidationError::new("length"));
            }
        }
        if let Some(Some(location)) = &self.location {
            if location.chars().count() > 80 {
                errors.add("location", ValidationError::new("length"));
            }
        }
        if let Some(Some(birthdate)) = &self.birthdate {
            if parse_iso_date(birthdate).is_none() {
                errors.add("birthdate", ValidationError::new("birthdate"));
            }
        }
        if let Some(Some(website)) = &self.website {
            if !validator::validate_url(website) {
                errors.add("website", ValidationError::new("url"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub user_id: Uuid,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub birthdate: Option<String>,
    pub website: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Profile> for ProfileDto {
    fn from(p: Profile) -> Self {
        Self {
            user_id: p.user_id,
            bio: p.bio,
            location: p.location,
            birthdate: p
                .birthdate
                .and_then(|d| d.format(format_description!("[year]-[month]-[day]")).ok()),
            website: p.website,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn birthdate_must_be_a_real_date() {
        assert!(validate_birthdate("1990-05-17").is_ok());
        assert!(validate_birthdate("2020-02-29").is_ok());
        assert!(validate_birthdate("2021-02-29").is_err());
        assert!(validate_birthdate("2020-13-01").is_err());
        assert!(validate_birthdate("17-05-1990").is_err());
        assert!(validate_birthdate("1990/05/17").is_err());
    }

    #[test]
    fn create_request_enforces_field_limits() {
        let too_long = CreateProfileRequest {
            bio: Some("x".repeat(281)),
            ..Default::default()
        };
        assert!(too_long.validate().is_err());

        let ok = CreateProfileRequest {
            bio: Some("hello".into()),
            location: Some("Berlin".into()),
            birthdate: Some("1990-05-17".into()),
            website: Some("https://example.com".into()),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn update_distinguishes_absent_from_null() {
        let cleared: UpdateProfileRequest = serde_json::from_str(r#"{"bio":null}"#).unwrap();
        assert_eq!(cleared.bio, Some(None));
        assert!(cleared.location.is_none());
        assert!(!cleared.is_empty());

        let empty: UpdateProfileRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn update_validates_present_values() {
        let bad: UpdateProfileRequest =
            serde_json::from_str(r#"{"birthdate":"soon"}"#).unwrap();
        assert!(bad.validate().is_err());

        let ok: UpdateProfileRequest =
            serde_json::from_str(r#"{"birthdate":"2000-01-01","website":null}"#).unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn update_counts_characters_not_bytes() {
        // 280 two-byte characters: within the limit even though it is 560 bytes.
        let bio = "ü".repeat(280);
        let req = UpdateProfileRequest {
            bio: Some(Some(bio)),
            ..Default::default()
        };
        assert!(req.validate().is_ok());

        let req = UpdateProfileRequest {
            bio: Some(Some("ü".repeat(281))),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn dto_formats_birthdate_as_iso_date() {
        let profile = Profile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            bio: None,
            location: None,
            birthdate: parse_iso_date("1990-05-17"),
            website: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(ProfileDto::from(profile)).unwrap();
        assert_eq!(json["birthdate"], "1990-05-17");
    }
}
