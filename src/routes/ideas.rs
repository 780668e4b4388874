//! Idea and comment endpoints: board reads, authenticated submissions,
//! anonymous voting and admin/author moderation.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::session::{AdminSession, MaybeAdmin, MaybeUser, UserSession};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::{IdeaPatch, NewIdea};
use crate::tenant::Tenant;

// -- Request bodies --

#[derive(Deserialize)]
pub struct CreateIdeaRequest {
    pub title: String,
    pub description: String,
}

#[derive(Deserialize)]
pub struct UpdateIdeaRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Vote,
    Unvote,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub action: VoteAction,
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

// -- Validation --

fn check_title(title: &str, errors: &mut BTreeMap<String, String>) {
    if title.chars().count() < 3 {
        errors.insert("title".into(), "Title must be at least 3 characters".into());
    } else if title.chars().count() > 100 {
        errors.insert("title".into(), "Title must be less than 100 characters".into());
    }
}

fn check_description(description: &str, errors: &mut BTreeMap<String, String>) {
    if description.chars().count() < 10 {
        errors.insert(
            "description".into(),
            "Description must be at least 10 characters".into(),
        );
    } else if description.chars().count() > 1000 {
        errors.insert(
            "description".into(),
            "Description must be less than 1000 characters".into(),
        );
    }
}

fn check_comment_text(text: &str, errors: &mut BTreeMap<String, String>) {
    if text.is_empty() {
        errors.insert("text".into(), "Comment cannot be empty".into());
    } else if text.chars().count() > 500 {
        errors.insert("text".into(), "Comment must be less than 500 characters".into());
    }
}

fn finish_validation(errors: BTreeMap<String, String>) -> AppResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

impl CreateIdeaRequest {
    fn validate(&self) -> AppResult<()> {
        let mut errors = BTreeMap::new();
        check_title(&self.title, &mut errors);
        check_description(&self.description, &mut errors);
        finish_validation(errors)
    }
}

impl UpdateIdeaRequest {
    fn validate(&self) -> AppResult<()> {
        let mut errors = BTreeMap::new();
        if let Some(ref title) = self.title {
            check_title(title, &mut errors);
        }
        if let Some(ref description) = self.description {
            check_description(description, &mut errors);
        }
        finish_validation(errors)
    }
}

impl CommentRequest {
    fn validate(&self) -> AppResult<()> {
        let mut errors = BTreeMap::new();
        check_comment_text(&self.text, &mut errors);
        finish_validation(errors)
    }
}

// -- Authorization --

/// Idea and comment mutation is allowed for the tenant admin or the
/// resource's author; everyone else gets 401 and no write happens.
fn authorize_owner(
    admin: &MaybeAdmin,
    user: Option<&UserSession>,
    author_email: &str,
) -> AppResult<()> {
    if admin.0.is_some() {
        return Ok(());
    }
    match user {
        Some(user) if user.email == author_email => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

// -- Handlers --

/// GET /ideas — no auth. Reads fail open: a storage error degrades to an
/// empty board instead of a 500. Writes never do this.
pub async fn list_ideas(State(state): State<AppState>, tenant: Tenant) -> Response {
    match state.store.list_ideas(&tenant) {
        Ok(ideas) => Json(ideas).into_response(),
        Err(e) => {
            tracing::warn!(tenant = tenant.as_str(), "Failed to list ideas: {}", e);
            Json(json!([])).into_response()
        }
    }
}

/// POST /ideas — requires a user session; author is the session email.
pub async fn create_idea(
    State(state): State<AppState>,
    tenant: Tenant,
    user: UserSession,
    Json(req): Json<CreateIdeaRequest>,
) -> AppResult<Response> {
    req.validate()?;
    let idea = state.store.create_idea(
        &tenant,
        NewIdea {
            title: req.title,
            description: req.description,
            author_email: user.email,
        },
    )?;
    Ok(Json(idea).into_response())
}

/// PATCH /ideas/{id} — admin or author.
pub async fn update_idea(
    State(state): State<AppState>,
    tenant: Tenant,
    admin: MaybeAdmin,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateIdeaRequest>,
) -> AppResult<Response> {
    req.validate()?;
    let idea = state.store.get_idea(&tenant, &id)?;
    authorize_owner(&admin, user.as_ref(), &idea.author_email)?;

    let updated = state.store.update_idea(
        &tenant,
        &id,
        IdeaPatch {
            title: req.title,
            description: req.description,
        },
    )?;
    Ok(Json(updated).into_response())
}

/// DELETE /ideas/{id} — admin or author; comments cascade.
pub async fn delete_idea(
    State(state): State<AppState>,
    tenant: Tenant,
    admin: MaybeAdmin,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let idea = state.store.get_idea(&tenant, &id)?;
    authorize_owner(&admin, user.as_ref(), &idea.author_email)?;

    state.store.delete_idea(&tenant, &id)?;
    Ok(Json(json!({ "success": true })).into_response())
}

/// POST /ideas/{id}/vote — no auth; one-per-user is tracked client-side.
pub async fn vote_idea(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<Response> {
    let delta = match req.action {
        VoteAction::Vote => 1,
        VoteAction::Unvote => -1,
    };
    let idea = state.store.vote_idea(&tenant, &id, delta)?;
    Ok(Json(idea).into_response())
}

/// POST /ideas/{id}/reset-votes — admin only.
pub async fn reset_votes(
    State(state): State<AppState>,
    _admin: AdminSession,
    tenant: Tenant,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let idea = state.store.reset_votes(&tenant, &id)?;
    Ok(Json(idea).into_response())
}

/// POST /ideas/{id}/comment — requires a user session.
pub async fn add_comment(
    State(state): State<AppState>,
    tenant: Tenant,
    user: UserSession,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> AppResult<Response> {
    req.validate()?;
    let comment = state
        .store
        .add_comment(&tenant, &id, req.text, user.email)?;
    Ok(Json(comment).into_response())
}

/// PATCH /ideas/{id}/comment/{commentId} — admin or comment author.
pub async fn update_comment(
    State(state): State<AppState>,
    tenant: Tenant,
    admin: MaybeAdmin,
    MaybeUser(user): MaybeUser,
    Path((id, comment_id)): Path<(String, String)>,
    Json(req): Json<CommentRequest>,
) -> AppResult<Response> {
    req.validate()?;
    let comment = state.store.get_comment(&tenant, &id, &comment_id)?;
    authorize_owner(&admin, user.as_ref(), &comment.author_email)?;

    let updated = state
        .store
        .update_comment(&tenant, &id, &comment_id, req.text)?;
    Ok(Json(updated).into_response())
}

/// DELETE /ideas/{id}/comment/{commentId} — admin or comment author.
pub async fn delete_comment(
    State(state): State<AppState>,
    tenant: Tenant,
    admin: MaybeAdmin,
    MaybeUser(user): MaybeUser,
    Path((id, comment_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let comment = state.store.get_comment(&tenant, &id, &comment_id)?;
    authorize_owner(&admin, user.as_ref(), &comment.author_email)?;

    state.store.delete_comment(&tenant, &id, &comment_id)?;
    Ok(Json(json!({ "success": true })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_idea_validation_rejects_short_fields() {
        let req = CreateIdeaRequest {
            title: "ab".into(),
            description: "short".into(),
        };
        match req.validate().unwrap_err() {
            AppError::Validation(fields) => {
                assert!(fields.contains_key("title"));
                assert!(fields.contains_key("description"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_idea_validation_rejects_long_title() {
        let req = CreateIdeaRequest {
            title: "x".repeat(101),
            description: "a perfectly fine description".into(),
        };
        assert!(matches!(
            req.validate().unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn update_idea_validation_skips_absent_fields() {
        let req = UpdateIdeaRequest {
            title: None,
            description: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn comment_validation_bounds() {
        assert!(CommentRequest { text: "hi".into() }.validate().is_ok());
        assert!(CommentRequest { text: "".into() }.validate().is_err());
        assert!(CommentRequest {
            text: "x".repeat(501)
        }
        .validate()
        .is_err());
    }

    #[test]
    fn owner_check_allows_admin_and_author_only() {
        let admin = MaybeAdmin(Some(AdminSession {
            tenant: Tenant::new("a.test"),
        }));
        let no_admin = MaybeAdmin(None);
        let author = UserSession {
            email: "author@x.com".into(),
        };
        let stranger = UserSession {
            email: "stranger@x.com".into(),
        };

        assert!(authorize_owner(&admin, None, "author@x.com").is_ok());
        assert!(authorize_owner(&no_admin, Some(&author), "author@x.com").is_ok());
        assert!(authorize_owner(&no_admin, Some(&stranger), "author@x.com").is_err());
        assert!(authorize_owner(&no_admin, None, "author@x.com").is_err());
    }
}
