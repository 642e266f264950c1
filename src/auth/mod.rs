//! Credential and session lifecycle.
//!
//! Flow Overview:
//! 1) Signup validates the payload, hashes the password with Argon2id and stores
//!    an unverified user.
//! 2) Email verification issues a 6-character code (15 minute TTL) and mails it;
//!    presenting a matching code flips `verified` and wipes every code for that user.
//! 3) Signin compares the password hash and mints an HS256 claims token returned in
//!    the body and as the `jwt` cookie.
//! 4) Account routes resolve the token back into a verified user before mutating.

pub mod code;
pub mod error;
pub mod flow;
pub mod password;
pub mod session;
pub mod validate;

pub use error::AuthError;
pub use flow::AuthFlow;
pub use password::PasswordHasher;
pub use session::{IssuedSession, SessionCookie, SessionIssuer};
