use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::Role,
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` in place of a bearer token.
pub const LOCAL_PRINCIPAL_HEADER: &str = "x-user-email";

/// Claims
///
/// Payload of the bearer tokens minted by the external authorization server.
/// Only signature, expiry and audience are checked here; role and existence come
/// from the store.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the principal's email.
    pub sub: String,
    /// Audience (aud): the resource ids this token was issued for. Issuers send
    /// either a single string or an array; both decode here.
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    /// issue
    ///
    /// Signs a token for `email` valid for `ttl`. Used by tests and local tooling;
    /// production tokens come from the authorization server.
    pub fn issue(
        email: &str,
        audience: &str,
        secret: &str,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = Claims {
            sub: email.to_string(),
            aud: vec![audience.to_string()],
            iat: now as usize,
            exp: (now + ttl.as_secs()) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(auds) => auds,
    })
}

/// AuthUser
///
/// The resolved principal of a request: the store's current view of the user
/// named by the token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// resolve
    ///
    /// Runs the full resource-server check against the raw request parts:
    /// 1. Local bypass via `x-user-email` (only in `Env::Local`).
    /// 2. `Authorization: Bearer <jwt>` extraction and decoding.
    /// 3. Store lookup by email, so deleted users and role changes apply at once.
    ///
    /// Every failure short of a store error is `AuthenticationRequired`.
    pub async fn resolve<S>(parts: &mut Parts, state: &S) -> Result<Self, ApiError>
    where
        S: Send + Sync,
        RepositoryState: FromRef<S>,
        AppConfig: FromRef<S>,
    {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            if let Some(email) = parts
                .headers
                .get(LOCAL_PRINCIPAL_HEADER)
                .and_then(|value| value.to_str().ok())
            {
                if let Some(user) = repo.find_user_by_email(email).await? {
                    return Ok(AuthUser {
                        id: user.id,
                        email: user.email,
                        role: user.role,
                    });
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::AuthenticationRequired)?;

        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.set_audience(&[config.jwt_audience.as_str()]);

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                ErrorKind::InvalidAudience => tracing::debug!("rejected token for another audience"),
                _ => tracing::debug!("rejected token: {}", e),
            }
            ApiError::AuthenticationRequired
        })?;

        let email = token_data.claims.sub;
        let user = repo.find_user_by_email(&email).await?.ok_or_else(|| {
            tracing::debug!(principal = %email, "token subject has no user record");
            ApiError::AuthenticationRequired
        })?;

        Ok(AuthUser {
            id: user.id,
            email: user.email,
            role: user.role,
        })
    }
}

/// AuthUser Extractor Implementation
///
/// Reuses the principal the access gate already resolved when present; otherwise
/// resolves it from scratch. Rejects with 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }
        AuthUser::resolve(parts, state).await
    }
}
