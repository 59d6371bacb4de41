//! Token authority: password login, JWT issuance and stateless verification.
//!
//! Verification depends only on the token, the caller-supplied time and the
//! immutable configuration captured at construction, so a single authority
//! can be shared across all workers without locking.

use actix_web::{dev::ServiceRequest, web, Error, HttpMessage};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::models::{Account, AuthenticatedUser, Claims};
use crate::password::verify_password;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("token signing failed: {0}")]
    SigningError(String),
}

pub struct TokenAuthority {
    account: Account,
    algorithm: Algorithm,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenAuthority {
    /// Fails with [`AuthError::SigningError`] when the secret is empty; callers
    /// treat that as fatal.
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        if config.secret.is_empty() {
            return Err(AuthError::SigningError(
                "signing secret must be non-empty".to_string(),
            ));
        }

        // Expiry is checked against the caller's clock in `verify_token`.
        let mut validation = Validation::new(config.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            account: config.account,
            algorithm: config.algorithm,
            ttl: config.ttl,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Check submitted credentials against the configured account.
    ///
    /// The password hash is checked even when the username is wrong so both
    /// failure paths cost the same.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<&Account, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let username_matches: bool = self
            .account
            .username
            .as_bytes()
            .ct_eq(username.as_bytes())
            .into();
        let password_matches = verify_password(password, &self.account.password_hash);

        if username_matches && password_matches {
            Ok(&self.account)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Sign a token for `account` valid from `now` for the configured TTL.
    ///
    /// Identical `(account, now)` inputs produce identical tokens.
    pub fn issue_token(&self, account: &Account, now: DateTime<Utc>) -> Result<String, AuthError> {
        let issued_at = now.timestamp();
        let expires_at = issued_at
            .checked_add(self.ttl.num_seconds())
            .ok_or_else(|| AuthError::SigningError("expiry overflows".to_string()))?;

        let claims = Claims {
            sub: account.username.clone(),
            iat: issued_at,
            exp: expires_at,
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|err| AuthError::SigningError(err.to_string()))
    }

    /// Verify a token's signature and expiry at `now`, returning its subject.
    pub fn verify_token(&self, token: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = self.decode_claims(token)?;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::TokenExpired);
        }
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims.sub)
    }

    /// Resolve a verified subject back to the configured account.
    pub fn account_for(&self, subject: &str) -> Option<&Account> {
        (self.account.username == subject).then_some(&self.account)
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Bearer guard for `HttpAuthentication::bearer`.
///
/// On success the token subject is stored in request extensions as
/// [`AuthenticatedUser`].
pub async fn validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let Some(authority) = req.app_data::<web::Data<TokenAuthority>>().cloned() else {
        tracing::error!("bearer guard mounted without a token authority");
        return Err((
            ApiError::from(AuthError::SigningError("no token authority".to_string())).into(),
            req,
        ));
    };

    match authority.verify_token(credentials.token(), Utc::now()) {
        Ok(subject) => {
            req.extensions_mut().insert(AuthenticatedUser { subject });
            Ok(req)
        }
        Err(err) => {
            tracing::debug!(path = %req.path(), "rejected bearer token: {err}");
            Err((ApiError::from(err).into(), req))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::hash_password_with_cost;
    use chrono::TimeZone;

    const SECRET: &str = "test-secret-key-that-is-long-enough";

    fn alice() -> Account {
        Account {
            username: "alice".to_string(),
            full_name: None,
            password_hash: hash_password_with_cost("wonderland", 4).unwrap(),
        }
    }

    fn config(secret: &str, algorithm: Algorithm) -> AuthConfig {
        AuthConfig {
            account: alice(),
            secret: secret.to_string(),
            algorithm,
            ttl: Duration::minutes(30),
        }
    }

    fn authority() -> TokenAuthority {
        TokenAuthority::new(config(SECRET, Algorithm::HS256)).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_secret_is_fatal() {
        let result = TokenAuthority::new(config("", Algorithm::HS256));

        assert!(matches!(result, Err(AuthError::SigningError(_))));
    }

    #[test]
    fn test_authenticate_valid_credentials() {
        let authority = authority();

        let account = authority.authenticate("alice", "wonderland").unwrap();

        assert_eq!(account.username, "alice");
    }

    #[test]
    fn test_authenticate_rejects_bad_credentials() {
        let authority = authority();

        for (username, password) in [
            ("alice", "wrongpass"),
            ("bob", "wonderland"),
            ("bob", "wrongpass"),
            ("", ""),
            ("alice", ""),
            ("", "wonderland"),
            ("Alice", "wonderland"),
            ("alice ", "wonderland"),
        ] {
            assert_eq!(
                authority.authenticate(username, password).err(),
                Some(AuthError::InvalidCredentials),
                "({username:?}, {password:?}) should be rejected"
            );
        }
    }

    #[test]
    fn test_alice_scenario() {
        let authority = authority();
        let account = authority.authenticate("alice", "wonderland").unwrap();
        let token = authority.issue_token(account, t0()).unwrap();

        assert_eq!(
            authority.verify_token(&token, t0() + Duration::minutes(10)),
            Ok("alice".to_string())
        );
        assert_eq!(
            authority.verify_token(&token, t0() + Duration::minutes(31)),
            Err(AuthError::TokenExpired)
        );
        assert_eq!(
            authority.authenticate("alice", "wrongpass").err(),
            Some(AuthError::InvalidCredentials)
        );
    }

    #[test]
    fn test_valid_until_expiry() {
        let authority = authority();
        let token = authority.issue_token(&alice(), t0()).unwrap();

        for offset in [0, 1, 60, 29 * 60, 30 * 60 - 1] {
            assert_eq!(
                authority.verify_token(&token, t0() + Duration::seconds(offset)),
                Ok("alice".to_string()),
                "token should be valid {offset}s after issue"
            );
        }
    }

    #[test]
    fn test_expired_at_and_after_ttl() {
        let authority = authority();
        let token = authority.issue_token(&alice(), t0()).unwrap();
        let expiry = t0() + authority.ttl();

        for now in [
            expiry,
            expiry + Duration::milliseconds(1),
            expiry + Duration::seconds(1),
            expiry + Duration::days(365),
        ] {
            assert_eq!(
                authority.verify_token(&token, now),
                Err(AuthError::TokenExpired)
            );
        }
    }

    #[test]
    fn test_issue_is_deterministic() {
        let authority = authority();

        let first = authority.issue_token(&alice(), t0()).unwrap();
        let second = authority.issue_token(&alice(), t0()).unwrap();
        let later = authority
            .issue_token(&alice(), t0() + Duration::seconds(1))
            .unwrap();

        assert_eq!(first, second);
        assert_ne!(first, later);
    }

    #[test]
    fn test_claims_layout() {
        let authority = authority();
        let token = authority.issue_token(&alice(), t0()).unwrap();

        let claims = authority.decode_claims(&token).unwrap();

        assert_eq!(
            claims,
            Claims {
                sub: "alice".to_string(),
                iat: t0().timestamp(),
                exp: t0().timestamp() + 30 * 60,
            }
        );
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let authority = authority();
        let token = authority.issue_token(&alice(), t0()).unwrap();
        let signature_start = token.rfind('.').unwrap() + 1;

        for index in [signature_start, (signature_start + token.len()) / 2, token.len() - 1] {
            let mut bytes = token.clone().into_bytes();
            bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            assert_eq!(
                authority.verify_token(&tampered, t0()),
                Err(AuthError::InvalidToken),
                "flipping byte {index} should invalidate the token"
            );
        }
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenAuthority::new(config("another-secret", Algorithm::HS256)).unwrap();
        let token = issuer.issue_token(&alice(), t0()).unwrap();

        assert_eq!(
            authority().verify_token(&token, t0()),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_algorithm_is_pinned() {
        let issuer = TokenAuthority::new(config(SECRET, Algorithm::HS512)).unwrap();
        let token = issuer.issue_token(&alice(), t0()).unwrap();

        assert_eq!(issuer.verify_token(&token, t0()), Ok("alice".to_string()));
        assert_eq!(
            authority().verify_token(&token, t0()),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let authority = authority();

        for token in ["", "not-a-jwt", "a.b.c", "a.b", "...."] {
            assert_eq!(
                authority.verify_token(token, t0()),
                Err(AuthError::InvalidToken),
                "{token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_subject_rejected() {
        let authority = authority();
        let nameless = Account {
            username: String::new(),
            ..alice()
        };
        let token = authority.issue_token(&nameless, t0()).unwrap();

        assert_eq!(
            authority.verify_token(&token, t0()),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_account_for() {
        let authority = authority();

        assert!(authority.account_for("alice").is_some());
        assert!(authority.account_for("bob").is_none());
        assert!(authority.account_for("").is_none());
    }

    #[test]
    fn test_concurrent_verification() {
        let authority = authority();
        let token = authority.issue_token(&alice(), t0()).unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let authority = &authority;
                    let token = &token;
                    scope.spawn(move || authority.verify_token(token, t0() + Duration::minutes(i)))
                })
                .collect();

            for handle in handles {
                assert_eq!(handle.join().unwrap(), Ok("alice".to_string()));
            }
        });
    }
}
