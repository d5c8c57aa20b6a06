//! The federation router.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::map_response,
    routing::{get, post},
};

use crate::handler::{
    FederationState, acct_handler, emoji_handler, featured_handler, follow_handler,
    follow_request_handler, followers_handler, following_handler, like_handler,
    note_activity_handler, note_handler, outbox_handler, publickey_handler,
    shared_inbox_handler, user_handler, user_inbox_handler,
};
use crate::middleware::{HtmlFallbackLayer, federation_headers};

/// Maximum accepted inbox body size.
pub const INBOX_BODY_LIMIT: usize = 64 * 1024;

/// HTML router used when no web frontend is mounted.
#[must_use]
pub fn not_acceptable_router() -> Router {
    Router::new().fallback(|| async { StatusCode::NOT_ACCEPTABLE })
}

/// Build the federation routes.
///
/// `html` serves requests to negotiated routes whose `Accept` header
/// prefers HTML.
pub fn federation_router(state: FederationState, html: Router) -> Router {
    let negotiated = Router::new()
        .route("/notes/{note}", get(note_handler))
        .route("/users/{user}", get(user_handler))
        .route("/{acct}", get(acct_handler))
        .layer(HtmlFallbackLayer::new(html));

    Router::new()
        .route(
            "/inbox",
            post(shared_inbox_handler).layer(DefaultBodyLimit::max(INBOX_BODY_LIMIT)),
        )
        .route(
            "/users/{user}/inbox",
            post(user_inbox_handler).layer(DefaultBodyLimit::max(INBOX_BODY_LIMIT)),
        )
        .route("/notes/{note}/activity", get(note_activity_handler))
        .route("/users/{user}/followers", get(followers_handler))
        .route("/users/{user}/following", get(following_handler))
        .route("/users/{user}/outbox", get(outbox_handler))
        .route("/users/{user}/collections/featured", get(featured_handler))
        .route("/users/{user}/publickey", get(publickey_handler))
        .route("/emojis/{emoji}", get(emoji_handler))
        .route("/likes/{like}", get(like_handler))
        .route("/follows/{request}", get(follow_request_handler))
        .route("/follows/{follower}/{followee}", get(follow_handler))
        .merge(negotiated)
        .layer(map_response(federation_headers))
        .with_state(state)
}
