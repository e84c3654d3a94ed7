//! Signed bearer tokens.
//!
//! Tokens are HS256 JWTs. The registered claims are `sub` (the user id as a
//! string), `iat` and `exp`; `username` rides along as a private claim.
//! Expiry is checked with zero leeway.

use crate::AuthError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use numthread_config::AuthConfig;
use numthread_core::model::{User, UserId};
use serde::{Deserialize, Serialize};

/// What a verified token asserts about its bearer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

/// JWT payload as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JwtClaims {
    sub: String,
    username: String,
    iat: i64,
    exp: i64,
}

impl TryFrom<JwtClaims> for Claims {
    type Error = AuthError;

    fn try_from(raw: JwtClaims) -> Result<Self, Self::Error> {
        let id = raw.sub.parse::<i64>().map_err(|_| AuthError::InvalidToken)?;
        Ok(Self {
            sub: UserId(id),
            username: raw.username,
            iat: raw.iat,
            exp: raw.exp,
        })
    }
}

/// Issues and verifies bearer tokens with a single HS256 secret.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("key", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Build a signer from the `[auth]` section.
    ///
    /// Without a configured secret a random key is generated, so tokens
    /// stop verifying once the process exits.
    pub fn from_config(config: &AuthConfig) -> Self {
        let hours = i64::try_from(config.token_ttl_hours).unwrap_or(i64::MAX);
        let ttl = Duration::try_hours(hours).unwrap_or(Duration::MAX);

        match &config.token_secret {
            Some(secret) => Self::new(secret.as_bytes(), ttl),
            None => {
                tracing::warn!(
                    "No auth.token_secret configured; using a random key. \
                     Issued tokens will not survive a restart."
                );
                Self::new(random_key(), ttl)
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user`, valid for the configured lifetime.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        let expires = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let claims = JwtClaims {
            sub: user.id.0.to_string(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    /// Check the signature and expiry of `token`, returning its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<JwtClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            }
        })?;
        Claims::try_from(data.claims)
    }
}

/// 32 bytes from the thread-local CSPRNG.
fn random_key() -> Vec<u8> {
    use rand::Rng;
    let mut rng = rand::rng();
    let mut key = vec![0u8; 32];
    rng.fill(&mut key[..]);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> User {
        User {
            id: UserId(7),
            username: "ada".into(),
        }
    }

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret", Duration::hours(1))
    }

    #[test]
    fn issue_and_verify() {
        let signer = signer();
        let token = signer.issue(&ada()).unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, UserId(7));
        assert_eq!(claims.username, "ada");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn token_is_a_three_part_jwt() {
        let token = signer().issue(&ada()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        );

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
    }

    #[test]
    fn expired_token_rejected() {
        let signer = signer();
        let issued = Utc::now() - Duration::hours(2);
        let token = signer.issue_at(&ada(), issued).unwrap();
        assert!(matches!(signer.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn expiry_has_no_leeway() {
        let signer = signer();
        let now = Utc::now();

        let fresh = signer
            .issue_at(&ada(), now - Duration::minutes(59))
            .unwrap();
        assert!(signer.verify(&fresh).is_ok());

        // Expired ten seconds ago; the library default would still accept it.
        let stale = signer
            .issue_at(&ada(), now - Duration::hours(1) - Duration::seconds(10))
            .unwrap();
        assert!(matches!(signer.verify(&stale), Err(AuthError::Expired)));
    }

    #[test]
    fn wrong_key_rejected() {
        let token = signer().issue(&ada()).unwrap();
        let other = TokenSigner::new("other-secret", Duration::hours(1));
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn swapped_payload_rejected() {
        let signer = signer();
        let ada_token = signer.issue(&ada()).unwrap();
        let root_token = signer
            .issue(&User {
                id: UserId(1),
                username: "root".into(),
            })
            .unwrap();

        // Root's payload under ada's signature.
        let ada_parts: Vec<&str> = ada_token.split('.').collect();
        let root_parts: Vec<&str> = root_token.split('.').collect();
        let forged = format!("{}.{}.{}", ada_parts[0], root_parts[1], ada_parts[2]);
        assert!(matches!(signer.verify(&forged), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn non_numeric_subject_rejected() {
        let claims = JwtClaims {
            sub: "ada".into(),
            username: "ada".into(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(matches!(signer().verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn other_algorithms_rejected() {
        let claims = JwtClaims {
            sub: "7".into(),
            username: "ada".into(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(matches!(signer().verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn garbage_rejected() {
        let signer = signer();
        for token in ["", "no-dot", "a.b", "a.b.c", "...", "abc.!!!.x"] {
            assert!(
                matches!(signer.verify(token), Err(AuthError::InvalidToken)),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn configured_secret_is_shared() {
        let config = AuthConfig {
            token_secret: Some("shared".into()),
            ..AuthConfig::default()
        };
        let a = TokenSigner::from_config(&config);
        let b = TokenSigner::from_config(&config);
        let token = a.issue(&ada()).unwrap();
        assert!(b.verify(&token).is_ok());
        assert_eq!(a.ttl(), Duration::hours(168));
    }

    #[test]
    fn random_keys_differ() {
        let config = AuthConfig::default();
        let a = TokenSigner::from_config(&config);
        let b = TokenSigner::from_config(&config);
        let token = a.issue(&ada()).unwrap();
        assert!(a.verify(&token).is_ok());
        assert!(b.verify(&token).is_err());
    }

    #[test]
    fn debug_hides_key() {
        let debug = format!("{:?}", signer());
        assert!(!debug.contains("test-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
