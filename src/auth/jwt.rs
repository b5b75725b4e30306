//! JWT bearer token verification
//!
//! Tokens are minted by the identity service; the library only checks the
//! HS256 signature, expiry and issuer, and reads the caller's web3 address
//! and role from the claims.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::ParticipantRole;
use crate::types::LibraryError;

/// Payload stored in JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuing service name
    pub iss: String,
    /// Subject (participant nickname or id)
    #[serde(default)]
    pub sub: String,
    /// Caller's web3 address
    pub web3_address: String,
    /// Role at issue time (the library re-reads the stored role)
    pub role: ParticipantRole,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of token validation
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

impl TokenValidationResult {
    pub fn valid(claims: Claims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }

    /// Turn the validation result into claims or an Unauthorized error
    pub fn into_claims(self) -> Result<Claims, LibraryError> {
        match self.claims {
            Some(claims) if self.valid => Ok(claims),
            _ => Err(LibraryError::Unauthorized(
                self.error.unwrap_or_else(|| "Invalid token".into()),
            )),
        }
    }
}

/// JWT validator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    issuer: String,
}

impl JwtValidator {
    /// Create a new JWT validator
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String, issuer: impl Into<String>) -> Result<Self, LibraryError> {
        if secret.is_empty() {
            return Err(LibraryError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(LibraryError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            issuer: issuer.into(),
        })
    }

    /// Create a validator for dev mode (allows empty secret)
    pub fn new_dev(issuer: impl Into<String>) -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign a token for the given address and role.
    ///
    /// Used by dev tooling and tests; production tokens come from the identity service.
    pub fn generate_token(
        &self,
        web3_address: &str,
        role: ParticipantRole,
        expiry_seconds: u64,
    ) -> Result<String, LibraryError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| LibraryError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: web3_address.to_string(),
            web3_address: web3_address.to_string(),
            role,
            iat: now,
            exp: now + expiry_seconds,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Verify and decode a JWT token
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let mut validation = Validation::default();
        validation.set_issuer(&[self.issuer.as_str()]);

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => TokenValidationResult::valid(token_data.claims),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidToken => "Invalid token",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    ErrorKind::InvalidIssuer => "Token is not valid for this service",
                    _ => "Token validation failed",
                };
                TokenValidationResult::invalid(error_msg)
            }
        }
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "0xdd868980ef73edcbc1ff758f6e53023be18e2a52";

    fn test_validator() -> JwtValidator {
        JwtValidator::new(
            "test-secret-that-is-at-least-32-characters-long".into(),
            "scriptorium",
        )
        .unwrap()
    }

    #[test]
    fn test_generate_and_verify_token() {
        let validator = test_validator();

        let token = validator
            .generate_token(ADDRESS, ParticipantRole::Validator, 3600)
            .unwrap();
        let result = validator.verify_token(&token);
        assert!(result.valid);

        let claims = result.into_claims().unwrap();
        assert_eq!(claims.web3_address, ADDRESS);
        assert_eq!(claims.role, ParticipantRole::Validator);
        assert_eq!(claims.iss, "scriptorium");
    }

    #[test]
    fn test_invalid_token() {
        let validator = test_validator();

        let result = validator.verify_token("invalid-token");
        assert!(!result.valid);
        assert!(matches!(
            result.into_claims(),
            Err(LibraryError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let ours = test_validator();
        let theirs = JwtValidator::new(
            "test-secret-that-is-at-least-32-characters-long".into(),
            "some-other-service",
        )
        .unwrap();

        let token = theirs
            .generate_token(ADDRESS, ParticipantRole::Admin, 3600)
            .unwrap();
        let result = ours.verify_token(&token);
        assert!(!result.valid);
        assert_eq!(
            result.error.as_deref(),
            Some("Token is not valid for this service")
        );
    }

    #[test]
    fn test_wrong_secret() {
        let validator1 = test_validator();
        let validator2 = JwtValidator::new(
            "different-secret-that-is-at-least-32-characters".into(),
            "scriptorium",
        )
        .unwrap();

        let token = validator1
            .generate_token(ADDRESS, ParticipantRole::Reader, 3600)
            .unwrap();
        assert!(!validator2.verify_token(&token).valid);
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(
            extract_token_from_header(Some("Bearer abc123")),
            Some("abc123")
        );
        assert_eq!(extract_token_from_header(Some("abc123")), Some("abc123"));
        assert_eq!(extract_token_from_header(None), None);
        assert_eq!(extract_token_from_header(Some("")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
    }

    #[test]
    fn test_secret_validation() {
        assert!(JwtValidator::new("short".into(), "scriptorium").is_err());
        assert!(JwtValidator::new("".into(), "scriptorium").is_err());
        assert!(
            JwtValidator::new("this-secret-is-at-least-32-chars-long".into(), "scriptorium")
                .is_ok()
        );
    }
}
