// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::AppError,
    models::session::{Role, SessionContext},
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the student identifier.
    pub sub: String,
    pub role: Role,
    /// Department used for schedule eligibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl From<Claims> for SessionContext {
    fn from(claims: Claims) -> Self {
        SessionContext {
            student_id: claims.sub,
            role: claims.role,
            department: claims.department.filter(|d| !d.trim().is_empty()),
        }
    }
}

/// Signs a token for a student or administrator. Token issuance belongs to
/// the external login service; this is used by tooling and tests.
pub fn sign_jwt(
    student_id: &str,
    role: Role,
    department: Option<&str>,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: student_id.to_owned(),
        role,
        department: department.map(str::to_owned),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header and injects the
/// resulting `SessionContext` into the request extensions.
/// Returns 401 Unauthorized otherwise.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token.trim(),
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    match verify_jwt(token, &config.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(SessionContext::from(claims));
            Ok(next.run(req).await)
        }
        Err(e) => {
            tracing::debug!("Rejected bearer token: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Returns 403 Forbidden unless the
/// session belongs to an administrator.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let ctx = req
        .extensions()
        .get::<SessionContext>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !ctx.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_claims() {
        let token = sign_jwt("sv1", Role::Student, Some("CNTT"), "secret", 60).unwrap();
        let ctx = SessionContext::from(verify_jwt(&token, "secret").unwrap());

        assert_eq!(ctx.student_id, "sv1");
        assert_eq!(ctx.department.as_deref(), Some("CNTT"));
        assert!(!ctx.is_admin());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = sign_jwt("admin", Role::Admin, None, "secret", 60).unwrap();
        assert!(verify_jwt(&token, "other").is_err());
    }

    #[test]
    fn test_blank_department_is_none() {
        let ctx = SessionContext::from(Claims {
            sub: "sv1".into(),
            role: Role::Student,
            department: Some("  ".into()),
            exp: 0,
        });
        assert_eq!(ctx.department, None);
    }
}
