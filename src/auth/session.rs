//! Signed claims tokens for stateless sessions.
//!
//! Tokens are HS256 JWTs carrying `{ user_id, exp }`. There is no server-side
//! session table: a token is valid while its signature checks out and
//! `now <= exp` according to the injected clock.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error};

use super::AuthError;
use crate::clock::SharedClock;

pub const SESSION_COOKIE_NAME: &str = "jwt";
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: i64,
    exp: i64,
}

/// Token plus the cookie that carries it.
#[derive(Debug)]
pub struct IssuedSession {
    pub token: String,
    pub cookie: SessionCookie,
}

#[derive(Debug)]
pub struct SessionCookie {
    token: String,
    max_age: i64,
    expires: DateTime<Utc>,
    secure: bool,
}

impl SessionCookie {
    /// Render as a `Set-Cookie` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        let expires = self.expires.format("%a, %d %b %Y %H:%M:%S GMT");
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}; Expires={expires}",
            self.token, self.max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

#[derive(Clone)]
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    secure_cookies: bool,
    clock: SharedClock,
}

impl fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("ttl", &self.ttl)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}

impl SessionIssuer {
    /// # Errors
    /// Returns an error if the secret is shorter than 32 bytes or the TTL is not positive.
    pub fn new(
        secret: &SecretString,
        ttl_seconds: i64,
        secure_cookies: bool,
        clock: SharedClock,
    ) -> Result<Self> {
        let secret = secret.expose_secret().as_bytes();
        if secret.len() < MIN_SECRET_LEN {
            bail!("JWT secret must be at least {MIN_SECRET_LEN} bytes");
        }
        if ttl_seconds <= 0 {
            bail!("session TTL must be positive");
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(ttl_seconds),
            secure_cookies,
            clock,
        })
    }

    /// Mint a token for the user, expiring `ttl` from now.
    ///
    /// # Errors
    /// `Internal` if signing fails.
    pub fn issue(&self, user_id: i64) -> Result<IssuedSession, AuthError> {
        let expires_at = self.clock.now() + self.ttl;
        let claims = Claims {
            user_id,
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|err| {
            error!("Failed to sign session token: {err}");
            AuthError::Internal
        })?;
        let cookie = SessionCookie {
            token: token.clone(),
            max_age: self.ttl.num_seconds(),
            expires: expires_at,
            secure: self.secure_cookies,
        };
        Ok(IssuedSession { token, cookie })
    }

    /// Verify signature and expiry and return the embedded user id.
    ///
    /// # Errors
    /// `Unauthorized` for a bad signature, an expired token or malformed claims.
    pub fn extract(&self, token: &str) -> Result<i64, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|err| {
            debug!("Rejected session token: {err}");
            AuthError::Unauthorized("Invalid token")
        })?;

        if self.clock.now().timestamp() > data.claims.exp {
            return Err(AuthError::Unauthorized("Token expired"));
        }
        Ok(data.claims.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use std::sync::Arc;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn issuer(clock: Arc<ManualClock>) -> Result<SessionIssuer> {
        SessionIssuer::new(
            &SecretString::from(SECRET.to_string()),
            DEFAULT_SESSION_TTL_SECONDS,
            true,
            clock,
        )
    }

    #[test]
    fn issue_then_extract() -> Result<()> {
        let issuer = issuer(Arc::new(ManualClock::default()))?;
        let session = issuer.issue(7)?;
        assert_eq!(issuer.extract(&session.token)?, 7);
        Ok(())
    }

    #[test]
    fn expired_token_is_unauthorized() -> Result<()> {
        let clock = Arc::new(ManualClock::default());
        let issuer = issuer(clock.clone())?;
        let session = issuer.issue(7)?;

        clock.advance(Duration::hours(12));
        assert_eq!(issuer.extract(&session.token)?, 7);

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            issuer.extract(&session.token),
            Err(AuthError::Unauthorized(_))
        ));
        Ok(())
    }

    #[test]
    fn token_from_other_secret_is_unauthorized() -> Result<()> {
        let clock = Arc::new(ManualClock::default());
        let other = SessionIssuer::new(
            &SecretString::from("ffffffffffffffffffffffffffffffff".to_string()),
            60,
            true,
            clock.clone(),
        )?;
        let token = other.issue(7)?.token;
        assert!(matches!(
            issuer(clock)?.extract(&token),
            Err(AuthError::Unauthorized(_))
        ));
        Ok(())
    }

    #[test]
    fn string_user_id_is_rejected() -> Result<()> {
        let clock = Arc::new(ManualClock::default());
        let issuer = issuer(clock.clone())?;
        let exp = (clock.now() + Duration::hours(1)).timestamp();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "user_id": "7", "exp": exp }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )?;
        assert!(matches!(
            issuer.extract(&token),
            Err(AuthError::Unauthorized(_))
        ));
        Ok(())
    }

    #[test]
    fn missing_exp_is_rejected() -> Result<()> {
        let issuer = issuer(Arc::new(ManualClock::default()))?;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "user_id": 7 }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )?;
        assert!(issuer.extract(&token).is_err());
        assert!(issuer.extract("garbage").is_err());
        Ok(())
    }

    #[test]
    fn short_secret_is_rejected() {
        let result = SessionIssuer::new(
            &SecretString::from("short".to_string()),
            60,
            true,
            Arc::new(ManualClock::default()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn cookie_attributes() -> Result<()> {
        let issuer = issuer(Arc::new(ManualClock::default()))?;
        let session = issuer.issue(1)?;
        let cookie = session.cookie.header_value();
        assert!(cookie.starts_with(&format!("jwt={}", session.token)));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=43200"));
        assert!(cookie.contains("Expires="));
        assert!(cookie.ends_with("GMT; Secure"));
        Ok(())
    }

    #[test]
    fn cookie_expiry_matches_token_expiry() -> Result<()> {
        let clock = Arc::new(ManualClock::default());
        let issuer = issuer(clock.clone())?;
        let session = issuer.issue(1)?;
        let expires = clock.now() + Duration::seconds(DEFAULT_SESSION_TTL_SECONDS);
        assert!(session
            .cookie
            .header_value()
            .contains(&expires.format("Expires=%a, %d %b %Y %H:%M:%S GMT").to_string()));

        clock.advance(Duration::seconds(DEFAULT_SESSION_TTL_SECONDS + 1));
        assert!(issuer.extract(&session.token).is_err());
        Ok(())
    }

    #[test]
    fn insecure_cookie_drops_secure_flag() -> Result<()> {
        let issuer = SessionIssuer::new(
            &SecretString::from(SECRET.to_string()),
            60,
            false,
            Arc::new(ManualClock::default()),
        )?;
        let cookie = issuer.issue(1)?.cookie.header_value();
        assert!(!cookie.contains("Secure"));
        assert!(cookie.contains("Max-Age=60"));
        Ok(())
    }
}
