//! Request middleware

mod authentication;
mod recovery;

pub use authentication::{Authentication, AuthenticatedUser};
pub use recovery::Recovery;
