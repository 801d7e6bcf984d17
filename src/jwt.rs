//! JWT token issuance and verification.
//!
//! Tokens are stateless: validity is a function of signature and expiry only.
//! There is no server-side revocation. A deactivated user's unexpired token
//! still verifies here; the request gate rejects it on its live `active` check.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::Role;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Per-request bearer credential (24 hours)
    Access,
    /// Used only to mint new access tokens (7 days), carries no role
    Refresh,
}

/// Decoded token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject user ID
    #[serde(rename = "userId")]
    pub user_id: i64,
    /// Role at issuance time (access tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access token duration: 24 hours
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 24 * 60 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Result of issuing a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

/// Signs and verifies tokens with one process-wide HS256 secret.
///
/// Constructed once at startup and shared read-only; the key never rotates.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    /// Create a token service with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Issue an access token bound to a user and role.
    pub fn issue_access_token(&self, user_id: i64, role: Role) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, Some(role), TokenType::Access, ACCESS_TOKEN_DURATION_SECS)
    }

    /// Issue a refresh token. Refresh tokens carry no role, so a role change
    /// takes effect on the next refresh.
    pub fn issue_refresh_token(&self, user_id: i64) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, None, TokenType::Refresh, REFRESH_TOKEN_DURATION_SECS)
    }

    fn issue(
        &self,
        user_id: i64,
        role: Option<Role>,
        token_type: TokenType,
        duration: u64,
    ) -> Result<IssuedToken, TokenError> {
        let now = now_secs()?;
        let claims = TokenClaims {
            user_id,
            role,
            token_type,
            iat: now,
            exp: now + duration,
        };

        Ok(IssuedToken {
            token: self.sign(&claims)?,
            issued_at: now,
            expires_at: claims.exp,
            duration,
        })
    }

    /// Sign arbitrary claims with the service key.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    /// Verify signature, algorithm and expiry of a token of either type.
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(TokenError::Decoding)
    }

    /// Verify a token and require it to be an access token with a role.
    pub fn verify_access_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = self.verify_token(token)?;
        if claims.token_type != TokenType::Access || claims.role.is_none() {
            return Err(TokenError::WrongTokenType);
        }
        Ok(claims)
    }

    /// Verify a token and require it to be a refresh token.
    pub fn verify_refresh_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = self.verify_token(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(TokenError::WrongTokenType);
        }
        Ok(claims)
    }
}

fn now_secs() -> Result<u64, TokenError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TokenError::TimeError)?
        .as_secs())
}

/// Errors that can occur during token operations.
#[derive(Debug)]
pub enum TokenError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Malformed token, bad signature, wrong algorithm or expired
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            TokenError::TimeError => write!(f, "System time error"),
            TokenError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for TokenError {}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-for-testing-0123456789";

    #[test]
    fn test_issue_and_verify_access_token() {
        let service = TokenService::new(SECRET);

        let issued = service.issue_access_token(42, Role::Doctor).unwrap();
        assert_eq!(issued.duration, ACCESS_TOKEN_DURATION_SECS);

        let claims = service.verify_token(&issued.token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.role, Some(Role::Doctor));
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
        assert_eq!(claims.iat, issued.issued_at);
    }

    #[test]
    fn test_issue_and_verify_refresh_token() {
        let service = TokenService::new(SECRET);

        let issued = service.issue_refresh_token(42).unwrap();
        assert_eq!(issued.duration, REFRESH_TOKEN_DURATION_SECS);

        let claims = service.verify_token(&issued.token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.role, None);
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_refresh_payload_has_no_role_field() {
        let service = TokenService::new(SECRET);
        let issued = service.issue_refresh_token(7).unwrap();

        let claims = jsonwebtoken::decode::<serde_json::Value>(
            &issued.token,
            &DecodingKey::from_secret(SECRET),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap()
        .claims;
        assert!(claims.get("role").is_none());
        assert_eq!(claims["typ"], "refresh");
        assert_eq!(claims["userId"], 7);
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let service = TokenService::new(SECRET);

        let access = service.issue_access_token(1, Role::Staff).unwrap();
        let refresh = service.issue_refresh_token(1).unwrap();

        assert!(matches!(
            service.verify_refresh_token(&access.token),
            Err(TokenError::WrongTokenType)
        ));
        assert!(matches!(
            service.verify_access_token(&refresh.token),
            Err(TokenError::WrongTokenType)
        ));
    }

    #[test]
    fn test_malformed_token() {
        let service = TokenService::new(SECRET);

        assert!(service.verify_token("invalid-token").is_err());
        assert!(service.verify_token("").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let issuer = TokenService::new(b"secret-1-secret-1-secret-1-secret-1");
        let verifier = TokenService::new(b"secret-2-secret-2-secret-2-secret-2");

        let issued = issuer.issue_access_token(1, Role::Admin).unwrap();
        assert!(verifier.verify_token(&issued.token).is_err());
    }

    #[test]
    fn test_wrong_algorithm() {
        let service = TokenService::new(SECRET);
        let now = now_secs().unwrap();
        let claims = TokenClaims {
            user_id: 1,
            role: Some(Role::Admin),
            token_type: TokenType::Access,
            iat: now,
            exp: now + 60,
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(service.verify_token(&token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let service = TokenService::new(SECRET);
        let now = now_secs().unwrap();

        // Create claims with exp in the past
        let claims = TokenClaims {
            user_id: 42,
            role: Some(Role::Doctor),
            token_type: TokenType::Access,
            iat: now - 100,
            exp: now - 50,
        };
        let token = service.sign(&claims).unwrap();

        assert!(service.verify_token(&token).is_err());
        assert!(service.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_unknown_role_in_token_rejected() {
        let service = TokenService::new(SECRET);
        let now = now_secs().unwrap();
        let claims = serde_json::json!({
            "userId": 1,
            "role": "superuser",
            "typ": "access",
            "iat": now,
            "exp": now + 60,
        });

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(service.verify_token(&token).is_err());
    }
}
