//! The admin credential ceremony: a per-tenant WebAuthn registration
//! (claiming the board) and authentication (admin login) flow.
//!
//! Each tenant has at most one admin credential. Until it exists, the
//! persistence layer refuses every write for that tenant.

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde_json::json;
use webauthn_rs::prelude::*;

use crate::auth::session::{
    admin_session_cookie, ceremony_cookie, clear_admin_session_cookie, clear_ceremony_cookie,
    get_cookie_value, sign_admin_token, AdminSession, CEREMONY_COOKIE,
};
use crate::auth::webauthn::{
    admin_user_handle, build_webauthn, PendingAuthentication, PendingRegistration,
};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::tenant::Tenant;

const ADMIN_USERNAME: &str = "admin";

fn origin_header(parts: &axum::http::request::Parts) -> Option<&str> {
    parts
        .headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
}

/// GET /admin/status — is this tenant's board claimed?
pub async fn status(State(state): State<AppState>, tenant: Tenant) -> AppResult<Response> {
    let is_setup = state
        .store
        .get_admin(&tenant)?
        .map(|record| record.is_configured())
        .unwrap_or(false);
    Ok(Json(json!({ "isSetup": is_setup })).into_response())
}

/// POST /admin/setup/generate-options — begin registration.
/// Refused once a credential exists; there is exactly one admin per tenant.
pub async fn setup_options(
    State(state): State<AppState>,
    tenant: Tenant,
    request: axum::http::Request<axum::body::Body>,
) -> AppResult<Response> {
    let (parts, _body) = request.into_parts();

    if let Some(record) = state.store.get_admin(&tenant)? {
        if record.is_configured() {
            return Err(AppError::AlreadyConfigured);
        }
    }

    let webauthn = build_webauthn(&tenant, origin_header(&parts))?;
    let user_handle = admin_user_handle(&tenant);

    let (mut ccr, reg_state) =
        webauthn.start_passkey_registration(user_handle, ADMIN_USERNAME, ADMIN_USERNAME, None)?;

    // The admin credential must be discoverable so login needs no allow-list.
    ccr.public_key.authenticator_selection =
        Some(webauthn_rs_proto::AuthenticatorSelectionCriteria {
            authenticator_attachment: None,
            resident_key: Some(webauthn_rs_proto::ResidentKeyRequirement::Required),
            require_resident_key: true,
            user_verification: webauthn_rs_proto::UserVerificationPolicy::Preferred,
        });

    let ceremony_id = uuid::Uuid::now_v7().to_string();
    {
        let mut ceremonies = state.ceremonies.lock().await;
        ceremonies.insert_registration(
            ceremony_id.clone(),
            PendingRegistration {
                reg_state,
                tenant: tenant.clone(),
            },
        );
    }

    Ok((
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, ceremony_cookie(&ceremony_id))]),
        Json(serde_json::to_value(&ccr)?),
    )
        .into_response())
}

/// POST /admin/setup/verify — complete registration. The challenge cookie
/// is cleared whether verification succeeds or fails.
pub async fn setup_verify(
    State(state): State<AppState>,
    tenant: Tenant,
    request: axum::http::Request<axum::body::Body>,
) -> Response {
    let result = do_setup_verify(&state, &tenant, request).await;
    with_ceremony_cookie_cleared(result)
}

async fn do_setup_verify(
    state: &AppState,
    tenant: &Tenant,
    request: axum::http::Request<axum::body::Body>,
) -> AppResult<Response> {
    let (parts, body) = request.into_parts();

    let ceremony_id = get_cookie_value(&parts, CEREMONY_COOKIE)
        .ok_or_else(|| AppError::BadRequest("Missing ceremony cookie".into()))?;

    let pending = {
        let mut ceremonies = state.ceremonies.lock().await;
        ceremonies
            .take_registration(ceremony_id, tenant)
            .ok_or_else(|| AppError::BadRequest("Ceremony expired or not found".into()))?
    };

    let body_bytes = axum::body::to_bytes(body, 1024 * 64)
        .await
        .map_err(|_| AppError::BadRequest("Invalid request body".into()))?;
    let reg_response: RegisterPublicKeyCredential = serde_json::from_slice(&body_bytes)?;

    let webauthn = build_webauthn(tenant, origin_header(&parts))?;
    let passkey = webauthn.finish_passkey_registration(&reg_response, &pending.reg_state)?;

    let passkey_json = serde_json::to_string(&passkey)?;
    state
        .store
        .create_admin(tenant, ADMIN_USERNAME, &passkey_json)?;

    let token = sign_admin_token(
        tenant,
        &state.config.auth.jwt_secret,
        state.config.auth.admin_session_hours,
    )?;

    Ok((
        StatusCode::OK,
        AppendHeaders([(
            header::SET_COOKIE,
            admin_session_cookie(tenant, &token, state.config.auth.admin_session_hours),
        )]),
        Json(json!({ "verified": true })),
    )
        .into_response())
}

/// POST /admin/login/generate-options — begin authentication.
/// Refused while the board is unclaimed.
pub async fn login_options(
    State(state): State<AppState>,
    tenant: Tenant,
    request: axum::http::Request<axum::body::Body>,
) -> AppResult<Response> {
    let (parts, _body) = request.into_parts();

    let passkey = stored_passkey(&state, &tenant)?;
    let webauthn = build_webauthn(&tenant, origin_header(&parts))?;

    let (mut rcr, auth_state) = webauthn.start_passkey_authentication(&[passkey])?;

    // The credential is discoverable; let the authenticator find it by
    // rp-id instead of advertising the credential id.
    rcr.public_key.allow_credentials = Vec::new();

    let ceremony_id = uuid::Uuid::now_v7().to_string();
    {
        let mut ceremonies = state.ceremonies.lock().await;
        ceremonies.insert_authentication(
            ceremony_id.clone(),
            PendingAuthentication {
                auth_state,
                tenant: tenant.clone(),
            },
        );
    }

    Ok((
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, ceremony_cookie(&ceremony_id))]),
        Json(serde_json::to_value(&rcr)?),
    )
        .into_response())
}

/// POST /admin/login/verify — complete authentication. The challenge cookie
/// is cleared whether verification succeeds or fails.
pub async fn login_verify(
    State(state): State<AppState>,
    tenant: Tenant,
    request: axum::http::Request<axum::body::Body>,
) -> Response {
    let result = do_login_verify(&state, &tenant, request).await;
    with_ceremony_cookie_cleared(result)
}

async fn do_login_verify(
    state: &AppState,
    tenant: &Tenant,
    request: axum::http::Request<axum::body::Body>,
) -> AppResult<Response> {
    let (parts, body) = request.into_parts();

    let ceremony_id = get_cookie_value(&parts, CEREMONY_COOKIE)
        .ok_or_else(|| AppError::BadRequest("Missing ceremony cookie".into()))?;

    let pending = {
        let mut ceremonies = state.ceremonies.lock().await;
        ceremonies
            .take_authentication(ceremony_id, tenant)
            .ok_or_else(|| AppError::BadRequest("Ceremony expired or not found".into()))?
    };

    let body_bytes = axum::body::to_bytes(body, 1024 * 64)
        .await
        .map_err(|_| AppError::BadRequest("Invalid request body".into()))?;
    let auth_response: PublicKeyCredential = serde_json::from_slice(&body_bytes)?;

    let webauthn = build_webauthn(tenant, origin_header(&parts))?;
    // Counter regression (replay) is rejected here by the library.
    let auth_result =
        webauthn.finish_passkey_authentication(&auth_response, &pending.auth_state)?;

    let mut passkey = stored_passkey(state, tenant)?;
    match passkey.update_credential(&auth_result) {
        Some(changed) => {
            if changed {
                let updated_json = serde_json::to_string(&passkey)?;
                state.store.update_admin_passkey(tenant, &updated_json)?;
            }
        }
        // The assertion verified against a credential we do not hold.
        None => return Err(AppError::BadRequest("Verification failed".into())),
    }

    let token = sign_admin_token(
        tenant,
        &state.config.auth.jwt_secret,
        state.config.auth.admin_session_hours,
    )?;

    Ok((
        StatusCode::OK,
        AppendHeaders([(
            header::SET_COOKIE,
            admin_session_cookie(tenant, &token, state.config.auth.admin_session_hours),
        )]),
        Json(json!({ "verified": true })),
    )
        .into_response())
}

/// GET /admin/verify — stateless session check; the extractor rejects with
/// 401 when the tenant's cookie is absent or invalid.
pub async fn verify(_admin: AdminSession) -> AppResult<Response> {
    Ok(Json(json!({ "authenticated": true })).into_response())
}

/// POST /admin/logout — clear the tenant's admin session cookie.
pub async fn logout(tenant: Tenant) -> AppResult<Response> {
    Ok((
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, clear_admin_session_cookie(&tenant))]),
        Json(json!({ "success": true })),
    )
        .into_response())
}

fn stored_passkey(state: &AppState, tenant: &Tenant) -> AppResult<Passkey> {
    let record = state
        .store
        .get_admin(tenant)?
        .filter(|record| record.is_configured())
        .ok_or(AppError::AdminNotConfigured)?;
    let json = record
        .passkey_json
        .ok_or(AppError::AdminNotConfigured)?;
    serde_json::from_str(&json)
        .map_err(|e| AppError::Internal(format!("Failed to parse stored passkey: {e}")))
}

fn with_ceremony_cookie_cleared(result: AppResult<Response>) -> Response {
    let mut response = match result {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };
    if let Ok(value) = HeaderValue::from_str(&clear_ceremony_cookie()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}
