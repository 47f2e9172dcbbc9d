use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use crate::app::AppState;
use crate::authz::{Principal, Role};
use crate::errors::AppError;
use crate::events::AuditContext;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if secret.trim().is_empty() {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self::new(secret, exp_hours))
    }

    pub fn new(secret: impl Into<String>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into().into_bytes()),
            exp_hours,
        }
    }

    /// Issues a token carrying the user's roles as of now. Role changes made
    /// later only show up after the next login.
    pub fn encode(&self, user_id: &str, email: &str, roles: &[Role]) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            roles: roles.iter().map(|role| role.as_str().to_string()).collect(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal::new(self.sub.clone()).with_role_names(&self.roles)
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub principal: Principal,
    pub email: String,
    pub correlation_id: Option<String>,
}

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.principal.user_id
    }

    pub fn audit_context(&self) -> AuditContext {
        AuditContext {
            actor_id: Some(self.principal.user_id.clone()),
            correlation_id: self.correlation_id.clone(),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        let claims = state.jwt.decode(token.trim())?;
        let principal = claims.principal();
        if !principal.is_authenticated() {
            return Err(AppError::unauthorized("token has no subject"));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(AuthUser {
            principal,
            email: claims.email,
            correlation_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_survive_the_token_round_trip() {
        let jwt = JwtConfig::new("unit-test-secret", 1);
        let token = jwt.encode("u1", "u1@example.com", &[Role::Manager, Role::Member]).unwrap();
        let claims = jwt.decode(&token).unwrap();

        let principal = claims.principal();
        assert_eq!(principal.user_id, "u1");
        assert!(principal.has_role(Role::Manager));
        assert!(principal.has_role(Role::Member));
        assert!(!principal.is_admin());
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let token = JwtConfig::new("one", 1).encode("u1", "u1@example.com", &[Role::Admin]).unwrap();
        assert!(matches!(JwtConfig::new("two", 1).decode(&token), Err(AppError::Token(_))));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let jwt = JwtConfig::new("unit-test-secret", -2);
        let token = jwt.encode("u1", "u1@example.com", &[Role::Member]).unwrap();
        assert!(jwt.decode(&token).is_err());
    }
}
