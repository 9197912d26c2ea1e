//! Password hashing and signed tokens.
//!
//! Tokens are HS256 JWTs keyed with the server secret. The `purpose` claim
//! keeps a session token from being replayed as a password-reset token.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

pub const RESET_TOKEN_TTL_MINUTES: i64 = 30;
pub const SESSION_TTL_DAYS: i64 = 14;

const PURPOSE_SESSION: &str = "session";
const PURPOSE_RESET: &str = "password_reset";

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).context("Failed to hash password")
}

/// A stored hash that bcrypt cannot parse never verifies.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    purpose: String,
    iat: i64,
    exp: i64,
}

#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue_reset_token(&self, user_id: i64) -> Result<String> {
        self.issue(
            user_id,
            PURPOSE_RESET,
            Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        )
    }

    #[must_use]
    pub fn verify_reset_token(&self, token: &str) -> Option<i64> {
        self.verify(token, PURPOSE_RESET)
    }

    pub fn issue_session_token(&self, user_id: i64) -> Result<String> {
        self.issue(user_id, PURPOSE_SESSION, Duration::days(SESSION_TTL_DAYS))
    }

    #[must_use]
    pub fn verify_session_token(&self, token: &str) -> Option<i64> {
        self.verify(token, PURPOSE_SESSION)
    }

    fn issue(&self, user_id: i64, purpose: &str, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            purpose: purpose.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).context("Failed to sign token")
    }

    fn verify(&self, token: &str, purpose: &str) -> Option<i64> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation).ok()?;
        (data.claims.purpose == purpose).then_some(data.claims.sub)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}
