use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::core::config::AuthConfig;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_token_expiry_minutes: i64,
    pub leeway_seconds: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for JwtConfig {
    fn from(auth: &AuthConfig) -> Self {
        Self {
            issuer: auth.issuer.clone(),
            audience: auth.audience.clone(),
            access_token_expiry_minutes: auth.token_expiry_minutes,
            leeway_seconds: auth.leeway_seconds,
        }
    }
}

/// Access-token payload. Only the account id is trusted on the way back in;
/// role and active flag are reloaded from the user store on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Signs and verifies HS256 access tokens.
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtManager {
    pub fn new(config: JwtConfig, secret: &str) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            bail!("JWT secret must be at least {MIN_SECRET_LEN} characters");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.leeway = config.leeway_seconds;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            config,
        })
    }

    pub fn from_auth_config(auth: &AuthConfig) -> Result<Self> {
        Self::new(JwtConfig::from(auth), &auth.jwt_secret)
    }

    pub fn issue(&self, user_id: Uuid, username: &str) -> Result<IssuedToken> {
        let ttl = Duration::minutes(self.config.access_token_expiry_minutes);
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            name: username.to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to sign access token")?;

        debug!("Issued access token for user {user_id}");
        Ok(IssuedToken {
            token,
            token_type: "Bearer".into(),
            expires_in: ttl.num_seconds(),
        })
    }

    /// Errors wrap the underlying `jsonwebtoken` error so callers can tell
    /// an expired token from a malformed one with [`is_expired_error`].
    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }
}

pub fn is_expired_error(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<jsonwebtoken::errors::Error>()
        .is_some_and(|e| matches!(e.kind(), ErrorKind::ExpiredSignature))
}

pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    let (scheme, token) = auth_header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}
