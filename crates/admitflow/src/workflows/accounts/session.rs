//! Bearer-token sessions signed as HS256 JWTs.
//!
//! A token is valid while its signature checks out, it has not expired, it has not been revoked
//! by logout, and the account it names still exists with the same role.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::error_response;
use crate::workflows::admissions::access::Actor;
use crate::workflows::admissions::domain::{AccountId, Role};
use crate::workflows::admissions::repository::StoreError;

use super::domain::Account;
use super::repository::AccountStore;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    iat: i64,
    exp: i64,
    jti: String,
}

/// Verified caller identity for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub actor: Actor,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("authorization header must be `Bearer <token>`")]
    MalformedHeader,
    #[error("invalid session token")]
    InvalidToken,
    #[error("session expired")]
    Expired,
    #[error("session has been signed out")]
    Revoked,
    #[error("session account no longer exists")]
    UnknownAccount,
    #[error("could not sign session token: {0}")]
    Signing(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub fn status(&self) -> StatusCode {
        match self {
            SessionError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SessionError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        error_response(self.status(), self.to_string())
    }
}

/// Issues, verifies, and revokes session tokens.
pub struct SessionAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    accounts: Arc<dyn AccountStore>,
    // token id -> expiry timestamp, pruned as entries lapse
    revoked: Mutex<HashMap<String, i64>>,
}

impl SessionAuthority {
    pub fn new(secret: &str, ttl: Duration, accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            accounts,
            revoked: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue(&self, account: &Account) -> Result<IssuedToken, SessionError> {
        let issued_at = Utc::now();
        let expires_at = issued_at + self.ttl;
        let token_id = token_id();
        let claims = Claims {
            sub: account.id.0.to_string(),
            role: account.role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: token_id.clone(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| SessionError::Signing(err.to_string()))?;
        Ok(IssuedToken {
            token,
            token_id,
            expires_at,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Session, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map_err(
            |err| match err.kind() {
                JwtErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::InvalidToken,
            },
        )?;
        let claims = data.claims;

        if self.is_revoked(&claims.jti) {
            return Err(SessionError::Revoked);
        }

        let account_id = claims
            .sub
            .parse::<u64>()
            .map(AccountId)
            .map_err(|_| SessionError::InvalidToken)?;
        let account = self
            .accounts
            .account(account_id)?
            .ok_or(SessionError::UnknownAccount)?;
        if account.role != claims.role {
            return Err(SessionError::InvalidToken);
        }

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(SessionError::InvalidToken)?;
        Ok(Session {
            actor: Actor::new(account.id, account.role),
            token_id: claims.jti,
            expires_at,
        })
    }

    /// Sign the session out. Revoking twice is harmless.
    pub fn revoke(&self, session: &Session) {
        let now = Utc::now().timestamp();
        let mut revoked = match self.revoked.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        revoked.retain(|_, expiry| *expiry >= now);
        revoked.insert(session.token_id.clone(), session.expires_at.timestamp());
    }

    fn is_revoked(&self, token_id: &str) -> bool {
        match self.revoked.lock() {
            Ok(guard) => guard.contains_key(token_id),
            Err(poisoned) => poisoned.into_inner().contains_key(token_id),
        }
    }
}

fn token_id() -> String {
    rand::random::<[u8; 16]>()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
    Arc<SessionAuthority>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = SessionError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authority = Arc::<SessionAuthority>::from_ref(state);
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(SessionError::MissingToken)?
            .to_str()
            .map_err(|_| SessionError::MalformedHeader)?;
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(SessionError::MalformedHeader)?;
        authority.verify(token)
    }
}
