//! Authentication module
//!
//! Credential verification, access token issuing, refresh token rotation
//! and the refresh cookie.

mod claims;
mod cookie;
mod credentials;
mod jwt;
mod password;
mod refresh_token;

pub use claims::Claims;
pub use cookie::{clear_refresh_cookie, refresh_cookie, REFRESH_COOKIE_NAME};
pub use credentials::verify_credentials;
pub use jwt::{generate_access_token, validate_access_token};
pub use password::{hash_password, verify_password};
pub use refresh_token::{generate_refresh_secret, RefreshTokenStore};
