//! Authenticator: issues and validates Ed25519-signed JWTs.
//!
//! Tokens are JWS compact strings with `alg = EdDSA` and a mandatory `kid`
//! header naming the key in the [`KeyRegistry`] that signed them. Validation
//! reads the `kid` before verifying anything, resolves the verification key,
//! then checks the signature, the issuer, and expiry.
//!
//! # Example
//!
//! ```ignore
//! use financify_auth::{Authenticator, ROLE_USER};
//! use financify_config::AuthConfig;
//!
//! let auth = Authenticator::from_config(&AuthConfig::from_env())?;
//! let claims = auth.claims_for("u1", vec![ROLE_USER.to_string()], chrono::Utc::now());
//! let token = auth.issue_active(&claims)?;
//! assert_eq!(auth.validate(&token)?, claims);
//! ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header, encode};

use financify_config::AuthConfig;

use crate::claims::Claims;
use crate::error::{AuthError, TokenError};
use crate::keys::KeyRegistry;

#[derive(Debug)]
pub struct Authenticator {
    keys: KeyRegistry,
    issuer: String,
    token_ttl: Duration,
    validation: Validation,
}

impl Authenticator {
    pub fn new(keys: KeyRegistry, issuer: impl Into<String>, token_ttl_secs: i64) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            keys,
            issuer,
            token_ttl: Duration::seconds(token_ttl_secs.max(1)),
            validation,
        }
    }

    /// Loads the key directory named by `config` and builds an authenticator.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let keys = KeyRegistry::load_dir(&config.keys_dir, config.active_kid.as_deref())?;
        Ok(Self::new(keys, config.issuer.clone(), config.token_ttl_secs))
    }

    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Claims for `subject` issued at `now`, expiring after the configured TTL.
    pub fn claims_for(
        &self,
        subject: impl Into<String>,
        roles: Vec<String>,
        now: DateTime<Utc>,
    ) -> Claims {
        Claims::new(self.issuer.clone(), subject, roles, now, now + self.token_ttl)
    }

    /// Signs `claims` with the private key registered under `kid`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidClaims`] if `exp <= iat`
    /// - [`AuthError::UnknownKey`] if no key is registered under `kid`
    /// - [`AuthError::Signing`] if encoding fails
    pub fn issue(&self, kid: &str, claims: &Claims) -> Result<String, AuthError> {
        if !claims.has_valid_lifetime() {
            return Err(AuthError::InvalidClaims("exp must be after iat"));
        }

        let key = self.keys.signing_key(kid)?;

        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(kid.to_string());

        encode(&header, claims, key).map_err(AuthError::Signing)
    }

    /// Signs `claims` with the registry's active key.
    pub fn issue_active(&self, claims: &Claims) -> Result<String, AuthError> {
        let kid = self.keys.active_kid().ok_or(AuthError::NoActiveKey)?;
        self.issue(kid, claims)
    }

    /// Verifies `token` and returns its claims.
    ///
    /// Every failure is reported as [`AuthError::InvalidToken`]; the wrapped
    /// [`TokenError`] says which check failed and is meant for logs only.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|_| TokenError::Malformed)?;
        if header.alg != Algorithm::EdDSA {
            return Err(TokenError::Malformed.into());
        }

        let kid = header.kid.ok_or(TokenError::MissingKeyId)?;
        let key = self.keys.resolve(&kid).map_err(|_| TokenError::UnknownKey)?;

        let claims = decode::<Claims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| classify(e.kind()))?;

        if !claims.has_valid_lifetime() {
            return Err(TokenError::InvalidClaims.into());
        }
        if claims.is_expired_at(Utc::now()) {
            return Err(TokenError::Expired.into());
        }

        Ok(claims)
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::InvalidIssuer | ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidClaims,
        _ => TokenError::Malformed,
    }
}
