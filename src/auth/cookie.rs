use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};

use crate::configuration::CookieSettings;

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
/// The browser only sends the refresh token to the endpoint that consumes it.
const REFRESH_COOKIE_PATH: &str = "/auth/refresh";

fn build(value: String, secure: bool, max_age_seconds: i64) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE_NAME, value)
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::seconds(max_age_seconds))
        .finish()
}

pub fn refresh_cookie(token: String, settings: &CookieSettings) -> Cookie<'static> {
    build(token, settings.secure, settings.max_age_seconds)
}

/// Same attributes as [`refresh_cookie`] with an empty value that expires at once.
pub fn clear_refresh_cookie(settings: &CookieSettings) -> Cookie<'static> {
    build(String::new(), settings.secure, 0)
}
