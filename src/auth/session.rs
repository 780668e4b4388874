//! Signed session tokens and the extractors that validate them.
//!
//! Users hold a 7-day JWT carrying their email in the `auth_token` cookie.
//! Admins hold a 1-day JWT bound to their tenant in a per-tenant-named
//! cookie, set only after a successful credential ceremony.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;
use crate::tenant::{resolve, Tenant};

pub const USER_COOKIE: &str = "auth_token";
pub const CEREMONY_COOKIE: &str = "admin_ceremony";

#[derive(Debug, Serialize, Deserialize)]
pub struct UserClaims {
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    pub tenant: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn sign_user_token(email: &str, secret: &str, days: u64) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp();
    let claims = UserClaims {
        email: email.to_string(),
        iat: now,
        exp: now + (days as i64) * 24 * 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("JWT encode: {e}")))
}

pub fn verify_user_token(token: &str, secret: &str) -> Option<UserClaims> {
    decode::<UserClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

pub fn sign_admin_token(tenant: &Tenant, secret: &str, hours: u64) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp();
    let claims = AdminClaims {
        tenant: tenant.as_str().to_string(),
        iat: now,
        exp: now + (hours as i64) * 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("JWT encode: {e}")))
}

/// Valid only for the tenant it was issued to.
pub fn verify_admin_token(token: &str, tenant: &Tenant, secret: &str) -> bool {
    decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims.tenant == tenant.as_str())
    .unwrap_or(false)
}

// -- Cookie helpers --

pub fn user_session_cookie(token: &str, days: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        USER_COOKIE,
        token,
        days * 24 * 3600
    )
}

pub fn admin_session_cookie(tenant: &Tenant, token: &str, hours: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        tenant.admin_cookie_name(),
        token,
        hours * 3600
    )
}

pub fn clear_admin_session_cookie(tenant: &Tenant) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        tenant.admin_cookie_name()
    )
}

pub fn ceremony_cookie(ceremony_id: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=300",
        CEREMONY_COOKIE, ceremony_id
    )
}

pub fn clear_ceremony_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", CEREMONY_COOKIE)
}

pub fn get_cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

// -- Extractors --

/// The authenticated user behind a request. Rejects with 401 when the
/// session cookie is absent, invalid or expired.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub email: String,
}

impl FromRequestParts<AppState> for UserSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = get_cookie_value(parts, USER_COOKIE).ok_or(AppError::Unauthorized)?;
        let claims = verify_user_token(token, &state.config.auth.jwt_secret)
            .ok_or(AppError::Unauthorized)?;
        Ok(UserSession {
            email: claims.email,
        })
    }
}

/// Optional user — `None` instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<UserSession>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match UserSession::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(_) => Ok(MaybeUser(None)),
        }
    }
}

/// An authenticated tenant admin. The cookie name and the token's tenant
/// claim must both match the requesting host.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub tenant: Tenant,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok());
        let tenant = resolve(host);

        let cookie_name = tenant.admin_cookie_name();
        let token = get_cookie_value(parts, &cookie_name).ok_or(AppError::Unauthorized)?;
        if !verify_admin_token(token, &tenant, &state.config.auth.jwt_secret) {
            return Err(AppError::Unauthorized);
        }
        Ok(AdminSession { tenant })
    }
}

/// Optional admin — `None` instead of 401.
pub struct MaybeAdmin(pub Option<AdminSession>);

impl FromRequestParts<AppState> for MaybeAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match AdminSession::from_request_parts(parts, state).await {
            Ok(admin) => Ok(MaybeAdmin(Some(admin))),
            Err(_) => Ok(MaybeAdmin(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn user_token_roundtrip() {
        let token = sign_user_token("user@x.com", SECRET, 7).unwrap();
        let claims = verify_user_token(&token, SECRET).unwrap();
        assert_eq!(claims.email, "user@x.com");
    }

    #[test]
    fn user_token_rejects_wrong_secret() {
        let token = sign_user_token("user@x.com", SECRET, 7).unwrap();
        assert!(verify_user_token(&token, "other-secret").is_none());
    }

    #[test]
    fn user_token_rejects_garbage() {
        assert!(verify_user_token("not-a-token", SECRET).is_none());
    }

    #[test]
    fn admin_token_is_tenant_bound() {
        let a = Tenant::new("a.test");
        let b = Tenant::new("b.test");
        let token = sign_admin_token(&a, SECRET, 24).unwrap();
        assert!(verify_admin_token(&token, &a, SECRET));
        assert!(!verify_admin_token(&token, &b, SECRET));
    }

    #[test]
    fn admin_cookie_carries_tenant_name() {
        let tenant = Tenant::new("board.example.com");
        let cookie = admin_session_cookie(&tenant, "tok", 24);
        assert!(cookie.starts_with("admin_session_board_example_com=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=86400"));
    }

    #[test]
    fn clear_admin_cookie_has_zero_max_age() {
        let tenant = Tenant::new("a.test");
        assert!(clear_admin_session_cookie(&tenant).contains("Max-Age=0"));
    }

    #[test]
    fn ceremony_cookie_is_short_lived() {
        assert!(ceremony_cookie("abc").contains("Max-Age=300"));
    }
}
