//! Refresh-cookie policy, centralized so every set and clear uses the exact
//! same attributes. A clear only takes effect when the attributes match the
//! ones used to set the cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};

pub const REFRESH_COOKIE: &str = "refresh_token";

/// Path scope for the refresh cookie: the browser only attaches it to auth
/// endpoints, never to the rest of the API.
pub const AUTH_COOKIE_PATH: &str = "/api/auth";

pub fn refresh_cookie(token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .path(AUTH_COOKIE_PATH)
        .build()
}

pub fn clear_refresh_cookie() -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, ""))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .path(AUTH_COOKIE_PATH)
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_cookie_attributes() {
        let cookie = refresh_cookie("tok".into());
        assert_eq!(cookie.name(), REFRESH_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some(AUTH_COOKIE_PATH));
    }

    #[test]
    fn clear_uses_identical_attributes() {
        let set = refresh_cookie("tok".into());
        let clear = clear_refresh_cookie();
        assert_eq!(clear.name(), set.name());
        assert_eq!(clear.path(), set.path());
        assert_eq!(clear.http_only(), set.http_only());
        assert_eq!(clear.secure(), set.secure());
        assert_eq!(clear.same_site(), set.same_site());
        assert_eq!(clear.value(), "");
        assert_eq!(clear.max_age(), Some(time::Duration::ZERO));
    }
}
