use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AccessError, AccessResult},
    models::{Principal, SessionCredential},
    registry::PermissionRegistry,
};

/// Which half of the credential pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims
///
/// Payload signed into every token. Validated on each authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the principal id.
    pub sub: Uuid,
    /// Expiration time (seconds since epoch).
    pub exp: usize,
    /// Issued at (seconds since epoch).
    pub iat: usize,
    /// Unique token id, so two pairs issued in the same second still differ.
    pub jti: Uuid,
    pub kind: TokenKind,
}

/// TokenIssuer
///
/// Issues and verifies the HS256 bearer pair. This is the token cryptography the client
/// core treats as an external collaborator.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        )
    }

    /// Signs a fresh access/refresh pair for `principal_id`.
    pub fn issue(&self, principal_id: Uuid) -> AccessResult<SessionCredential> {
        Ok(SessionCredential {
            access: self.sign(principal_id, TokenKind::Access, self.access_ttl_secs)?,
            refresh: self.sign(principal_id, TokenKind::Refresh, self.refresh_ttl_secs)?,
        })
    }

    /// Signs a single token with an explicit lifetime. Negative lifetimes produce tokens
    /// that are already expired.
    pub fn sign(&self, principal_id: Uuid, kind: TokenKind, ttl_secs: i64) -> AccessResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: principal_id,
            iat: now.max(0) as usize,
            exp: (now + ttl_secs).max(0) as usize,
            jti: Uuid::new_v4(),
            kind,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AccessError::Internal(format!("token signing failed: {e}")))
    }

    /// verify_access
    ///
    /// Decodes a bearer token and checks signature, expiry and that it is an access token.
    /// Every failure is an authentication error; expiry gets its own message so the logs
    /// distinguish stale sessions from forged tokens.
    pub fn verify_access(&self, token: &str) -> AccessResult<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AccessError::authentication("token expired"),
                _ => AccessError::authentication("invalid token"),
            }
        })?;

        if data.claims.kind != TokenKind::Access {
            return Err(AccessError::authentication("not an access token"));
        }
        Ok(data.claims)
    }
}

/// CredentialHasher
///
/// Argon2id password hashing. The cost parameters come from configuration; verification
/// reads them back from the stored PHC string, so changing the cost does not lock anyone
/// out.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> AccessResult<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| AccessError::Internal(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn from_config(config: &AppConfig) -> AccessResult<Self> {
        Self::new(config.password_hash_memory_kib, config.password_hash_iterations)
    }

    pub fn hash(&self, password: &str) -> AccessResult<String> {
        // A v4 UUID carries 122 random bits, plenty for a salt.
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|e| AccessError::Internal(format!("salt encoding failed: {e}")))?;
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AccessError::Internal(format!("password hashing failed: {e}")))
    }

    pub fn verify(&self, hash: &str, password: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// AuthPrincipal
///
/// The resolved identity of an authenticated request. Handlers take it as an argument;
/// the registry takes it as the caller of every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPrincipal {
    pub id: Uuid,
    pub email: String,
    pub is_superuser: bool,
}

impl From<&Principal> for AuthPrincipal {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id,
            email: principal.email.clone(),
            is_superuser: principal.is_superuser,
        }
    }
}

/// AuthPrincipal Extractor Implementation
///
/// 1. Reuse the identity the auth middleware already resolved for this request, if any.
/// 2. Extract the `Authorization: Bearer <token>` header.
/// 3. Verify the token (signature, expiry, access kind).
/// 4. Load the principal and require it to still exist and be active, so deleting or
///    deactivating an account revokes its outstanding tokens.
///
/// Rejection: `AccessError::Authentication` (401) on any failure.
impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
    TokenIssuer: FromRef<S>,
    PermissionRegistry: FromRef<S>,
{
    type Rejection = AccessError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(resolved) = parts.extensions.get::<AuthPrincipal>() {
            return Ok(resolved.clone());
        }

        let tokens = TokenIssuer::from_ref(state);
        let registry = PermissionRegistry::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AccessError::authentication("missing bearer token"))?;

        let claims = tokens.verify_access(token).inspect_err(|e| {
            tracing::debug!(reason = %e, "bearer token rejected");
        })?;

        let principal = registry
            .find_principal(claims.sub)
            .await?
            .filter(|principal| principal.is_active)
            .ok_or_else(|| AccessError::authentication("account unavailable"))?;

        let resolved = AuthPrincipal::from(&principal);
        parts.extensions.insert(resolved.clone());
        Ok(resolved)
    }
}
