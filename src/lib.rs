//! # Zero (accounts, email verification and checkout)
//!
//! `zero` is a small HTTP backend for user registration, sign-in, email
//! verification, account management and payment checkout.
//!
//! ## Credentials
//!
//! Passwords are hashed with Argon2id before they reach the `users` table and
//! are only ever compared through the hasher; the plaintext is never stored or
//! logged.
//!
//! ## Sessions
//!
//! Sign-in issues a signed HS256 claims token (`user_id` + `exp`) valid for 12
//! hours by default. There is no server-side session table: a token is valid as
//! long as its signature checks out and it has not expired. The token is returned
//! in the body and as an `HttpOnly` cookie named `jwt`.
//!
//! ## Email verification
//!
//! Verification codes are 6 characters from `A-Z0-9`, valid for 15 minutes.
//! Any outstanding, unexpired code for a user is accepted; a successful
//! verification deletes every code for that user, so codes are single-use.
//! Account and checkout routes are only available to verified users.

pub mod api;
pub mod auth;
pub mod billing;
pub mod cli;
pub mod clock;
pub mod email;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
