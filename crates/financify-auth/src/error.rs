//! Authentication error types.

use thiserror::Error;

/// Why a token failed validation.
///
/// Callers only ever see [`AuthError::InvalidToken`]; the reason exists for
/// server-side logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("token header has no kid")]
    MissingKeyId,

    #[error("token signed with an unknown key")]
    UnknownKey,

    #[error("signature verification failed")]
    BadSignature,

    #[error("token expired")]
    Expired,

    /// Issuer mismatch or `exp <= iat`.
    #[error("token claims rejected")]
    InvalidClaims,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Any validation failure. The display text is the same for every reason.
    #[error("invalid token")]
    InvalidToken(TokenError),

    #[error("no signing key registered under kid {kid:?}")]
    UnknownKey { kid: String },

    #[error("no active signing key configured")]
    NoActiveKey,

    #[error("claims rejected for signing: {0}")]
    InvalidClaims(&'static str),

    #[error("signing token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("invalid key material for kid {kid:?}: {reason}")]
    KeyMaterial { kid: String, reason: String },

    #[error("reading signing keys: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthError {
    /// The internal reason of an [`AuthError::InvalidToken`].
    #[must_use]
    pub fn reason(&self) -> Option<TokenError> {
        match self {
            AuthError::InvalidToken(reason) => Some(*reason),
            _ => None,
        }
    }

    pub(crate) fn key_material(kid: &str, reason: impl ToString) -> Self {
        AuthError::KeyMaterial {
            kid: kid.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(reason: TokenError) -> Self {
        AuthError::InvalidToken(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_token_display_hides_reason() {
        let reasons = [
            TokenError::Malformed,
            TokenError::MissingKeyId,
            TokenError::UnknownKey,
            TokenError::BadSignature,
            TokenError::Expired,
            TokenError::InvalidClaims,
        ];
        for reason in reasons {
            let err = AuthError::from(reason);
            assert_eq!(err.to_string(), "invalid token");
            assert_eq!(err.reason(), Some(reason));
        }
    }

    #[test]
    fn test_unknown_key_has_no_reason() {
        let err = AuthError::UnknownKey {
            kid: "old".to_string(),
        };
        assert_eq!(err.reason(), None);
        assert!(err.to_string().contains("old"));
    }
}
