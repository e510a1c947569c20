//! Token claims and the role predicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role granting access to every user resource.
pub const ROLE_ADMIN: &str = "ADMIN";
/// Role held by ordinary users.
pub const ROLE_USER: &str = "USER";

/// Roles a token may carry.
pub const KNOWN_ROLES: [&str; 2] = [ROLE_ADMIN, ROLE_USER];

/// Identity and role assertions carried by a token.
///
/// Claims are immutable once built. They are produced by
/// [`Authenticator::claims_for`](crate::Authenticator::claims_for) at issuance
/// and rebuilt by [`Authenticator::validate`](crate::Authenticator::validate)
/// from a verified token.
///
/// # Fields
///
/// - `iss`: issuer, must match the configured issuer on validation
/// - `sub`: subject, the user id
/// - `iat`: issued-at (Unix seconds)
/// - `exp`: expiry (Unix seconds), always greater than `iat`
/// - `roles`: role names, order preserved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub roles: Vec<String>,
}

impl Claims {
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        roles: Vec<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            iss: issuer.into(),
            sub: subject.into(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            roles,
        }
    }

    /// Returns `true` when the subject holds at least one of `roles`.
    ///
    /// An empty `roles` list never authorizes anything.
    #[must_use]
    pub fn authorize(&self, roles: &[&str]) -> bool {
        self.roles.iter().any(|held| roles.contains(&held.as_str()))
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.authorize(&[ROLE_ADMIN])
    }

    /// `exp > iat`.
    #[must_use]
    pub fn has_valid_lifetime(&self) -> bool {
        self.exp > self.iat
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_with_roles(roles: &[&str]) -> Claims {
        let now = Utc::now();
        Claims::new(
            "financify service",
            "u1",
            roles.iter().map(|r| r.to_string()).collect(),
            now,
            now + Duration::hours(1),
        )
    }

    #[test]
    fn test_authorize_any_of() {
        let claims = claims_with_roles(&[ROLE_USER]);
        assert!(claims.authorize(&[ROLE_ADMIN, ROLE_USER]));
        assert!(claims.authorize(&[ROLE_USER]));
        assert!(!claims.authorize(&[ROLE_ADMIN]));
    }

    #[test]
    fn test_authorize_empty_sets() {
        assert!(!claims_with_roles(&[]).authorize(&[ROLE_ADMIN, ROLE_USER]));
        assert!(!claims_with_roles(&[ROLE_ADMIN]).authorize(&[]));
    }

    #[test]
    fn test_authorize_is_case_sensitive() {
        assert!(!claims_with_roles(&["admin"]).authorize(&[ROLE_ADMIN]));
    }

    #[test]
    fn test_lifetime() {
        let mut claims = claims_with_roles(&[ROLE_USER]);
        assert!(claims.has_valid_lifetime());
        claims.exp = claims.iat;
        assert!(!claims.has_valid_lifetime());
    }

    #[test]
    fn test_expiry_boundary() {
        let claims = claims_with_roles(&[ROLE_USER]);
        let exp = DateTime::from_timestamp(claims.exp, 0).unwrap();
        assert!(claims.is_expired_at(exp));
        assert!(!claims.is_expired_at(exp - Duration::seconds(1)));
    }

    #[test]
    fn test_claims_serialize() {
        let claims = Claims {
            iss: "financify service".to_string(),
            sub: "user-id-123".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
            roles: vec![ROLE_ADMIN.to_string()],
        };
        let serialized = serde_json::to_string(&claims).unwrap();
        assert!(serialized.contains(r#""sub":"user-id-123""#));
        assert!(serialized.contains(r#""roles":["ADMIN"]"#));
    }
}
