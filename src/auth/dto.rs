use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::extract::Sanitize;

/// Request body for login. Presence of both fields is enforced by
/// deserialization; the e-mail is canonicalized before the lookup.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Sanitize for LoginRequest {
    fn sanitize(&mut self) {
        self.email = self.email.trim().to_lowercase();
    }
}

/// Login/refresh response body. The refresh token never appears here; it
/// travels only in the httpOnly cookie.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_email_is_normalized() {
        let mut req = LoginRequest {
            email: "  Alice@Example.COM ".into(),
            password: "pw".into(),
        };
        req.sanitize();
        assert_eq!(req.email, "alice@example.com");
    }

    #[test]
    fn token_response_uses_camel_case() {
        let json = serde_json::to_value(TokenResponse {
            access_token: "abc".into(),
        })
        .unwrap();
        assert_eq!(json["accessToken"], "abc");
    }
}
