use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;

/// Longest accepted session lifetime (ten years).
pub const MAX_TOKEN_HOURS: u64 = 10 * 365 * 24;

/// Claims carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub jti: String, // session id, matches auth_tokens.jti
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: &str, expiration_hours: u64) -> Self {
        let now = Utc::now();
        // Duration::hours panics outside its range
        let hours = expiration_hours.clamp(1, MAX_TOKEN_HOURS) as i64;
        let exp = now + Duration::hours(hours);

        Self {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }
}

/// HS256 keys derived from the configured secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiration_hours: u64,
}

impl TokenKeys {
    pub fn new(secret: &str, expiration_hours: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiration_hours,
        }
    }

    pub fn expiration_hours(&self) -> u64 {
        self.expiration_hours
    }

    pub fn sign(&self, claims: &Claims) -> AppResult<String> {
        Ok(encode(&Header::default(), claims, &self.encoding)?)
    }

    /// Check signature and expiry.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("expiration_hours", &self.expiration_hours)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_token_verifies_with_same_secret() {
        let keys = TokenKeys::new("secret", 1);
        let claims = Claims::new("user-123", keys.expiration_hours());
        let token = keys.sign(&claims).unwrap();

        let decoded = keys.verify(&token).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.exp - decoded.iat, 3600);
    }

    #[test]
    fn each_token_gets_its_own_jti() {
        let a = Claims::new("user-123", 1);
        let b = Claims::new("user-123", 1);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = TokenKeys::new("secret", 1)
            .sign(&Claims::new("user-123", 1))
            .unwrap();
        assert!(TokenKeys::new("other", 1).verify(&token).is_err());
        assert!(TokenKeys::new("secret", 1).verify("garbage").is_err());
    }

    #[test]
    fn lifetime_is_clamped_to_the_supported_range() {
        let huge = Claims::new("user-123", u64::MAX);
        assert_eq!(huge.exp - huge.iat, MAX_TOKEN_HOURS as i64 * 3600);

        let zero = Claims::new("user-123", 0);
        assert_eq!(zero.exp - zero.iat, 3600);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = TokenKeys::new("secret", 1);
        let mut claims = Claims::new("user-123", 1);
        claims.iat -= 7200;
        claims.exp = claims.iat + 3600;
        let token = keys.sign(&claims).unwrap();
        assert!(keys.verify(&token).is_err());
    }
}
