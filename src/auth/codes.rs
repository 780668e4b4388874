//! Passwordless user login: a 6-digit one-time code is emailed, then traded
//! for a signed session cookie.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;

use crate::auth::session::{sign_user_token, user_session_cookie};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::tenant::Tenant;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

/// Generate a 6-digit numeric code, `100000`–`999999`.
fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// POST /auth/login — store a one-time code for (tenant, email) and email
/// it. A new code overwrites any live one for the same pair.
pub async fn login(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("Email is required".into()));
    }

    let code = generate_code();
    state.store.store_auth_code(&tenant, &email, &code)?;

    // The stored code stays valid even when dispatch fails, so a user who
    // received the code out-of-band can still verify.
    state
        .mailer
        .send_code(&email, &code)
        .await
        .map_err(|e| AppError::EmailDelivery(e.to_string()))?;

    Ok(Json(json!({ "success": true })).into_response())
}

/// POST /auth/verify — trade a code for a 7-day session cookie. Absent,
/// mismatched and expired codes all fail identically.
pub async fn verify(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(req): Json<VerifyRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_string();
    if email.is_empty() || req.code.is_empty() {
        return Err(AppError::BadRequest("Email and code are required".into()));
    }

    if !state
        .store
        .verify_and_consume_auth_code(&tenant, &email, &req.code)?
    {
        return Err(AppError::InvalidOrExpiredCode);
    }

    let token = sign_user_token(
        &email,
        &state.config.auth.jwt_secret,
        state.config.auth.user_session_days,
    )?;

    Ok((
        StatusCode::OK,
        AppendHeaders([(
            header::SET_COOKIE,
            user_session_cookie(&token, state.config.auth.user_session_days),
        )]),
        Json(json!({ "success": true, "user": { "email": email } })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }
}
