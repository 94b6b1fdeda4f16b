//! Session extraction and role gates.
//!
//! Sessions are minted by the external auth service; this API only verifies
//! the cookie JWT and trusts its claims. Handlers declare their access level
//! by extracting `MaybeSession`, `ModeratorSession` or `AdminSession`.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
#[cfg(test)]
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;

const COOKIE_NAME: &str = "nivaari_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Citizen,
    Moderator,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "admin" => Role::Admin,
            "moderator" => Role::Moderator,
            _ => Role::Citizen,
        }
    }

    /// Moderator endpoints accept moderators and admins.
    pub fn can_moderate(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
    issuer: String,
    #[cfg(test)]
    encoding_key: EncodingKey,
}

impl JwtService {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            #[cfg(test)]
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    // Sessions are minted by the auth service; this exists only so tests
    // can produce cookies to verify against.
    #[cfg(test)]
    pub fn create_token(&self, user_id: Uuid, role: &str) -> anyhow::Result<String> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::days(7);

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    pub fn verify_token(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}

/// The authenticated caller, as claimed by the session cookie.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
}

fn session_from_parts(parts: &Parts, state: &AppState) -> Option<Session> {
    let cookie_header = parts
        .headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = parse_cookie(cookie_header, COOKIE_NAME)?;
    let claims = state.jwt.verify_token(token).ok()?;
    let user_id = Uuid::parse_str(&claims.sub).ok()?;

    Some(Session {
        user_id,
        role: Role::parse(&claims.role),
    })
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "Not authenticated"})),
    )
        .into_response()
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({"error": "Forbidden"})),
    )
        .into_response()
}

/// Optional session: public endpoints use this for attribution only.
pub struct MaybeSession(pub Option<Session>);

impl FromRequestParts<Arc<AppState>> for MaybeSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(session_from_parts(parts, state)))
    }
}

/// Requires a moderator or admin session.
pub struct ModeratorSession(pub Session);

impl FromRequestParts<Arc<AppState>> for ModeratorSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts, state).ok_or_else(unauthorized)?;
        if !session.role.can_moderate() {
            return Err(forbidden());
        }
        Ok(ModeratorSession(session))
    }
}

/// Requires an admin session.
pub struct AdminSession(pub Session);

impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts, state).ok_or_else(unauthorized)?;
        if session.role != Role::Admin {
            return Err(forbidden());
        }
        Ok(AdminSession(session))
    }
}

/// Parse a specific cookie from the Cookie header string.
fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix(name) {
            if let Some(value) = value.strip_prefix('=') {
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip() {
        let jwt = JwtService::new("test-secret", "nivaari".to_string());
        let user_id = Uuid::new_v4();
        let token = jwt.create_token(user_id, "moderator").unwrap();
        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "moderator");
        assert_eq!(claims.iss, "nivaari");
    }

    #[test]
    fn rejects_wrong_secret() {
        let a = JwtService::new("secret-a", "nivaari".to_string());
        let b = JwtService::new("secret-b", "nivaari".to_string());
        let token = a.create_token(Uuid::new_v4(), "admin").unwrap();
        assert!(b.verify_token(&token).is_err());
    }

    #[test]
    fn rejects_wrong_issuer() {
        let a = JwtService::new("secret", "someone-else".to_string());
        let b = JwtService::new("secret", "nivaari".to_string());
        let token = a.create_token(Uuid::new_v4(), "admin").unwrap();
        assert!(b.verify_token(&token).is_err());
    }

    #[test]
    fn role_parsing_and_gates() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("moderator"), Role::Moderator);
        assert_eq!(Role::parse("citizen"), Role::Citizen);
        assert_eq!(Role::parse("anything-else"), Role::Citizen);

        assert!(Role::Admin.can_moderate());
        assert!(Role::Moderator.can_moderate());
        assert!(!Role::Citizen.can_moderate());
    }

    #[test]
    fn parse_cookie_works() {
        assert_eq!(
            parse_cookie("nivaari_session=abc123; other=xyz", "nivaari_session"),
            Some("abc123")
        );
        assert_eq!(
            parse_cookie("other=xyz; nivaari_session=abc123", "nivaari_session"),
            Some("abc123")
        );
        assert_eq!(parse_cookie("other=xyz", "nivaari_session"), None);
    }
}
