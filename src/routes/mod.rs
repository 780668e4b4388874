pub mod ideas;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::auth::{admin, codes};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Board
        .route("/ideas", get(ideas::list_ideas).post(ideas::create_idea))
        .route(
            "/ideas/{id}",
            patch(ideas::update_idea).delete(ideas::delete_idea),
        )
        .route("/ideas/{id}/vote", post(ideas::vote_idea))
        .route("/ideas/{id}/reset-votes", post(ideas::reset_votes))
        .route("/ideas/{id}/comment", post(ideas::add_comment))
        .route(
            "/ideas/{id}/comment/{commentId}",
            patch(ideas::update_comment).delete(ideas::delete_comment),
        )
        // User login
        .route("/auth/login", post(codes::login))
        .route("/auth/verify", post(codes::verify))
        // Admin ceremony
        .route("/admin/status", get(admin::status))
        .route("/admin/setup/generate-options", post(admin::setup_options))
        .route("/admin/setup/verify", post(admin::setup_verify))
        .route("/admin/login/generate-options", post(admin::login_options))
        .route("/admin/login/verify", post(admin::login_verify))
        .route("/admin/verify", get(admin::verify))
        .route("/admin/logout", post(admin::logout))
}
