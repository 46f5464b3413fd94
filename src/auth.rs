//! Bearer token authentication for the admin API
//!
//! Tokens are HS256 JWTs carrying the user id and role. Writes require the
//! `admin` role; the authenticated user id becomes the acting principal
//! recorded on progress log rows.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::RecordsError;

/// Role allowed to modify records
pub const ADMIN_ROLE: &str = "admin";

/// Payload stored in JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Input for creating a new token
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub role: String,
    pub full_name: Option<String>,
}

/// The authenticated user behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    expiry_seconds: u64,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("expiry_seconds", &self.expiry_seconds)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    /// Create a new JWT validator
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, RecordsError> {
        if secret.is_empty() {
            return Err(RecordsError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(RecordsError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Create a validator for dev mode
    pub fn new_dev() -> Self {
        Self {
            secret: "zpk-dev-secret-change-in-production".into(),
            expiry_seconds: 24 * 60 * 60,
        }
    }

    /// Generate a JWT token for an authenticated user
    pub fn generate_token(&self, input: TokenInput) -> Result<String, RecordsError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RecordsError::Auth(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            id: input.id,
            username: input.username,
            email: input.email,
            role: input.role,
            full_name: input.full_name,
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| RecordsError::Auth(format!("Failed to generate token: {}", e)))
    }

    /// Verify and decode a JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, RecordsError> {
        let validation = Validation::default();

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let msg = match err.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidSignature => "Invalid signature",
                _ => "Invalid token",
            };
            RecordsError::Auth(msg.into())
        })
    }

    /// Resolve the principal from an `Authorization` header value
    pub fn authenticate(&self, auth_header: Option<&str>) -> Result<Principal, RecordsError> {
        let token = extract_token_from_header(auth_header)
            .ok_or_else(|| RecordsError::Auth("No token provided".into()))?;

        self.verify_token(token).map(Principal::from)
    }

    /// Resolve the principal and require the admin role
    pub fn authorize_admin(&self, auth_header: Option<&str>) -> Result<Principal, RecordsError> {
        let principal = self.authenticate(auth_header)?;

        if !principal.is_admin() {
            return Err(RecordsError::Forbidden("Admin access required".into()));
        }

        Ok(principal)
    }
}

/// Extract token from Authorization header ("Bearer <token>")
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_for(validator: &JwtValidator, role: &str) -> String {
        validator
            .generate_token(TokenInput {
                id: 12,
                username: "officer".into(),
                email: None,
                role: role.into(),
                full_name: Some("Upazila Officer".into()),
            })
            .unwrap()
    }

    #[test]
    fn test_secret_length_enforced() {
        assert!(JwtValidator::new(String::new(), 60).is_err());
        assert!(JwtValidator::new("short".into(), 60).is_err());
        assert!(JwtValidator::new("x".repeat(32), 60).is_ok());
    }

    #[test]
    fn test_token_round_trip() {
        let validator = JwtValidator::new_dev();
        let token = token_for(&validator, ADMIN_ROLE);

        let claims = validator.verify_token(&token).unwrap();
        assert_eq!(claims.id, 12);
        assert_eq!(claims.username, "officer");
        assert_eq!(claims.role, ADMIN_ROLE);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtValidator::new("a".repeat(40), 60).unwrap();
        let verifier = JwtValidator::new("b".repeat(40), 60).unwrap();
        let token = token_for(&issuer, ADMIN_ROLE);

        assert!(matches!(verifier.verify_token(&token), Err(RecordsError::Auth(_))));
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token_from_header(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_token_from_header(Some("Bearer   ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc")), None);
        assert_eq!(extract_token_from_header(None), None);
    }

    #[test]
    fn test_admin_gate() {
        let validator = JwtValidator::new_dev();
        let admin = format!("Bearer {}", token_for(&validator, ADMIN_ROLE));
        let viewer = format!("Bearer {}", token_for(&validator, "viewer"));

        let principal = validator.authorize_admin(Some(&admin)).unwrap();
        assert_eq!(principal.id, 12);

        assert!(matches!(
            validator.authorize_admin(Some(&viewer)),
            Err(RecordsError::Forbidden(_))
        ));
        assert!(matches!(validator.authorize_admin(None), Err(RecordsError::Auth(_))));
        assert!(matches!(
            validator.authorize_admin(Some("Bearer not-a-jwt")),
            Err(RecordsError::Auth(_))
        ));
    }
}
