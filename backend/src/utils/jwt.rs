//! Signed access and refresh tokens.
//!
//! Both token classes are HS256 JWTs signed with the process-wide secret from
//! [`Config`]. A `typ` claim separates the classes so a token of one class is
//! never accepted where the other is expected. Every verification failure is
//! reported as an error; nothing degrades to a partially-trusted result.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::{config::Config, models::user::UserRole, types::UserId};

pub const ACCESS_TOKEN_TYPE: &str = "access";
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

const CORRELATION_ID_BYTES: usize = 32;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub typ: String,
}

/// Claims carried by a refresh token. `sid` is the session-correlation identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: UserId,
    pub sid: String,
    pub exp: i64,
    pub iat: i64,
    pub typ: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    MalformedToken,
}

/// Result of validating a token against its expected class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedToken {
    Access {
        principal_id: UserId,
        role: UserRole,
    },
    Refresh {
        principal_id: UserId,
        correlation_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.access_token_ttl(),
            config.refresh_token_ttl(),
        )
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access(
        &self,
        principal_id: UserId,
        role: UserRole,
    ) -> anyhow::Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = whole_seconds(now + self.access_ttl)?;
        let claims = Claims {
            sub: principal_id,
            role,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ: ACCESS_TOKEN_TYPE.to_string(),
        };
        Ok(IssuedToken {
            token: self.sign(&claims)?,
            expires_at,
        })
    }

    pub fn issue_refresh(
        &self,
        principal_id: UserId,
        correlation_id: &str,
    ) -> anyhow::Result<IssuedToken> {
        self.issue_refresh_until(principal_id, correlation_id, Utc::now() + self.refresh_ttl)
    }

    /// Issues a refresh token whose expiry is pinned to an existing grant.
    /// Rotation uses this so a rotated token never outlives its session.
    pub fn issue_refresh_until(
        &self,
        principal_id: UserId,
        correlation_id: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<IssuedToken> {
        let expires_at = whole_seconds(expires_at)?;
        let claims = RefreshClaims {
            sub: principal_id,
            sid: correlation_id.to_string(),
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            typ: REFRESH_TOKEN_TYPE.to_string(),
        };
        Ok(IssuedToken {
            token: self.sign(&claims)?,
            expires_at,
        })
    }

    pub fn validate(&self, token: &str, expected: TokenKind) -> Result<ValidatedToken, TokenError> {
        match expected {
            TokenKind::Access => self.validate_access(token).map(|claims| ValidatedToken::Access {
                principal_id: claims.sub,
                role: claims.role,
            }),
            TokenKind::Refresh => {
                self.validate_refresh(token)
                    .map(|claims| ValidatedToken::Refresh {
                        principal_id: claims.sub,
                        correlation_id: claims.sid,
                    })
            }
        }
    }

    pub fn validate_access(&self, token: &str) -> Result<Claims, TokenError> {
        let claims: Claims = self.verify(token, true)?;
        if claims.typ != ACCESS_TOKEN_TYPE {
            return Err(TokenError::MalformedToken);
        }
        Ok(claims)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        refresh_claims(self.verify(token, true)?)
    }

    /// Checks signature and class of a refresh token but accepts a past `exp`.
    /// Only used to locate the session of a token that has already run out.
    pub fn decode_expired_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        refresh_claims(self.verify(token, false)?)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> anyhow::Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| anyhow::anyhow!("Failed to sign token: {}", e))
    }

    fn verify<T: DeserializeOwned>(
        &self,
        token: &str,
        check_expiry: bool,
    ) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = check_expiry;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<T>(token.trim(), &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::MalformedToken,
            })
    }
}

fn refresh_claims(claims: RefreshClaims) -> Result<RefreshClaims, TokenError> {
    if claims.typ != REFRESH_TOKEN_TYPE || claims.sid.is_empty() {
        return Err(TokenError::MalformedToken);
    }
    Ok(claims)
}

/// Generates a fresh random session-correlation identifier.
pub fn generate_correlation_id() -> String {
    let mut bytes = [0u8; CORRELATION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// One-way digest under which a correlation identifier is stored.
///
/// The identifier is full-entropy random data, so a fast deterministic digest
/// is enough and keeps lookup-by-hash an equality match.
pub fn hash_correlation_id(correlation_id: &str) -> String {
    hex::encode(Sha256::digest(correlation_id.as_bytes()))
}

fn whole_seconds(at: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(at.timestamp(), 0)
        .ok_or_else(|| anyhow::anyhow!("Token expiry out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            "unit-test-secret-that-is-long-enough-1234",
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    #[test]
    fn access_token_roundtrip_carries_identity_and_role() {
        let codec = codec();
        let user_id = UserId::new();
        let issued = codec
            .issue_access(user_id, UserRole::Provider)
            .expect("issue access");

        let claims = codec.validate_access(&issued.token).expect("validate");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, UserRole::Provider);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert!((claims.exp - claims.iat - 15 * 60).abs() <= 1);
    }

    #[test]
    fn refresh_token_roundtrip_returns_same_principal_and_correlation_id() {
        let codec = codec();
        let user_id = UserId::new();
        let correlation_id = generate_correlation_id();
        let issued = codec
            .issue_refresh(user_id, &correlation_id)
            .expect("issue refresh");

        let validated = codec
            .validate(&issued.token, TokenKind::Refresh)
            .expect("validate");
        assert_eq!(
            validated,
            ValidatedToken::Refresh {
                principal_id: user_id,
                correlation_id,
            }
        );
        assert!(issued.expires_at > Utc::now() + Duration::days(6));
    }

    #[test]
    fn any_single_bit_flip_is_rejected() {
        let codec = codec();
        let issued = codec
            .issue_refresh(UserId::new(), &generate_correlation_id())
            .expect("issue refresh");

        for index in 0..issued.token.len() {
            for bit in 0..8 {
                let mut bytes = issued.token.clone().into_bytes();
                bytes[index] ^= 1 << bit;
                let Ok(tampered) = String::from_utf8(bytes) else {
                    continue;
                };
                let result = codec.validate(&tampered, TokenKind::Refresh);
                assert!(
                    matches!(
                        result,
                        Err(TokenError::InvalidSignature) | Err(TokenError::MalformedToken)
                    ),
                    "flip of bit {bit} at {index} was accepted: {result:?}"
                );
            }
        }
    }

    #[test]
    fn wrong_secret_fails_with_invalid_signature() {
        let issued = codec()
            .issue_access(UserId::new(), UserRole::Standard)
            .unwrap();
        let other = TokenCodec::new(
            "a-completely-different-secret-value-5678",
            Duration::minutes(15),
            Duration::days(7),
        );
        assert_eq!(
            other.validate_access(&issued.token).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn expired_refresh_token_fails_with_expired() {
        let codec = codec();
        let issued = codec
            .issue_refresh_until(
                UserId::new(),
                "corr",
                Utc::now() - Duration::hours(1),
            )
            .unwrap();
        assert_eq!(
            codec.validate_refresh(&issued.token).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn expired_refresh_token_still_decodes_for_cleanup_but_not_when_forged() {
        let codec = codec();
        let user_id = UserId::new();
        let issued = codec
            .issue_refresh_until(user_id, "corr", Utc::now() - Duration::hours(1))
            .unwrap();

        let claims = codec.decode_expired_refresh(&issued.token).expect("decode");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.sid, "corr");

        let other = TokenCodec::new(
            "a-completely-different-secret-value-5678",
            Duration::minutes(15),
            Duration::days(7),
        );
        assert_eq!(
            other.decode_expired_refresh(&issued.token).unwrap_err(),
            TokenError::InvalidSignature
        );

        let access = codec.issue_access(user_id, UserRole::Standard).unwrap();
        assert_eq!(
            codec.decode_expired_refresh(&access.token).unwrap_err(),
            TokenError::MalformedToken
        );
    }

    #[test]
    fn token_classes_are_not_interchangeable() {
        let codec = codec();
        let user_id = UserId::new();
        let access = codec.issue_access(user_id, UserRole::Standard).unwrap();
        let refresh = codec.issue_refresh(user_id, "corr").unwrap();

        assert_eq!(
            codec
                .validate(&access.token, TokenKind::Refresh)
                .unwrap_err(),
            TokenError::MalformedToken
        );
        assert_eq!(
            codec
                .validate(&refresh.token, TokenKind::Access)
                .unwrap_err(),
            TokenError::MalformedToken
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            codec().validate_access("invalid.token.here").unwrap_err(),
            TokenError::MalformedToken
        );
        assert_eq!(
            codec().validate_refresh("").unwrap_err(),
            TokenError::MalformedToken
        );
    }

    #[test]
    fn correlation_ids_are_random_and_hash_deterministically() {
        let first = generate_correlation_id();
        let second = generate_correlation_id();
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);

        assert_eq!(hash_correlation_id(&first), hash_correlation_id(&first));
        assert_ne!(hash_correlation_id(&first), hash_correlation_id(&second));
        assert_eq!(hash_correlation_id(&first).len(), 64);
        assert_ne!(hash_correlation_id(&first), first);
    }
}
