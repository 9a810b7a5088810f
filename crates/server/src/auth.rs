use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ADMIN_SUBJECT: &str = "admin";

#[derive(Debug, Clone)]
pub struct AdminAuth {
    password: Option<String>,
    secret: String,
    ttl_seconds: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("admin login is not configured")]
    Disabled,
    #[error("invalid admin password")]
    InvalidPassword,
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid or expired admin token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("token is not an admin session")]
    WrongSubject,
    #[error("failed to mint admin token")]
    Mint(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

impl AdminAuth {
    /// Login stays disabled unless both a password and a non-blank signing
    /// secret are supplied.
    pub fn new(password: Option<String>, secret: impl Into<String>, ttl_seconds: i64) -> Self {
        let secret = secret.into();
        let password = password.filter(|_| !secret.trim().is_empty());
        Self {
            password,
            secret,
            ttl_seconds,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }

    pub fn login(&self, password: &str) -> Result<IssuedToken, AuthError> {
        let expected = self.password.as_deref().ok_or(AuthError::Disabled)?;
        if password != expected {
            return Err(AuthError::InvalidPassword);
        }

        let now = Utc::now();
        let exp = (now + Duration::seconds(self.ttl_seconds)).timestamp();
        let claims = Claims {
            sub: ADMIN_SUBJECT.to_string(),
            iat: now.timestamp(),
            exp,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(AuthError::Mint)?;
        Ok(IssuedToken {
            token,
            expires_at: exp,
        })
    }

    pub fn verify(&self, token: &str) -> Result<(), AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(AuthError::InvalidToken)?;
        if data.claims.sub != ADMIN_SUBJECT {
            return Err(AuthError::WrongSubject);
        }
        Ok(())
    }

    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
