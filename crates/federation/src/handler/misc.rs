//! Emoji, like and follow handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use apserve_common::AppResult;
use apserve_db::entities::user;

use super::{FederationState, ap_response, empty};
use crate::convert::{EmojiToApEmoji, NoteToApNote, render_follow, render_like};
use crate::exposure::is_listable_note;
use crate::request::ApRequest;

/// Handle GET /emojis/{emoji}.
pub async fn emoji_handler(
    State(state): State<FederationState>,
    Path(name): Path<String>,
    request: ApRequest,
    headers: HeaderMap,
) -> AppResult<Response> {
    let decision = state.gate.should_refuse(&request, None).await;
    if decision.refuse {
        return Ok(decision.into_response());
    }
    let emoji = state
        .store
        .find_local_emoji(&name)
        .await?
        .filter(|emoji| emoji.host.is_none() && !emoji.local_only);
    let Some(emoji) = emoji else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };

    Ok(ap_response(
        &headers,
        decision,
        emoji.to_ap_emoji(&state.local.urls),
    ))
}

/// Handle GET /likes/{like}.
pub async fn like_handler(
    State(state): State<FederationState>,
    Path(reaction_id): Path<String>,
    request: ApRequest,
    headers: HeaderMap,
) -> AppResult<Response> {
    let decision = state.gate.should_refuse(&request, None).await;
    if decision.refuse {
        return Ok(decision.into_response());
    }
    let Some(reaction) = state.store.find_reaction(&reaction_id).await? else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };
    let note = state
        .store
        .find_note(&reaction.note_id)
        .await?
        .filter(is_listable_note);
    let Some(note) = note else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };

    let urls = &state.local.urls;
    Ok(ap_response(
        &headers,
        decision,
        render_like(&reaction, urls, note.ap_id(urls)),
    ))
}

/// Handle GET /follows/{follower}/{followee}.
pub async fn follow_handler(
    State(state): State<FederationState>,
    Path((follower_id, followee_id)): Path<(String, String)>,
    request: ApRequest,
    headers: HeaderMap,
) -> AppResult<Response> {
    let decision = state.gate.should_refuse(&request, None).await;
    if decision.refuse {
        return Ok(decision.into_response());
    }
    let Some((follower, followee)) = local_to_remote(&state, &follower_id, &followee_id).await?
    else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };
    if state
        .store
        .find_following_pair(&follower_id, &followee_id)
        .await?
        .is_none()
    {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    }

    let urls = &state.local.urls;
    Ok(ap_response(
        &headers,
        decision,
        render_follow(urls.follow_url(&follower_id, &followee_id), follower, followee),
    ))
}

/// Handle GET /follows/{request}.
pub async fn follow_request_handler(
    State(state): State<FederationState>,
    Path(request_id): Path<String>,
    request: ApRequest,
    headers: HeaderMap,
) -> AppResult<Response> {
    let decision = state.gate.should_refuse(&request, None).await;
    if decision.refuse {
        return Ok(decision.into_response());
    }
    let Some(follow_request) = state.store.find_follow_request(&request_id).await? else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };
    let pair = local_to_remote(
        &state,
        &follow_request.follower_id,
        &follow_request.followee_id,
    )
    .await?;
    let Some((follower, followee)) = pair else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };

    Ok(ap_response(
        &headers,
        decision,
        render_follow(
            state.local.urls.follow_request_url(&follow_request.id),
            follower,
            followee,
        ),
    ))
}

/// Actor URIs of a local follower and a remote followee, if both hold.
async fn local_to_remote(
    state: &FederationState,
    follower_id: &str,
    followee_id: &str,
) -> AppResult<Option<(String, String)>> {
    let follower = state
        .store
        .find_user(follower_id)
        .await?
        .filter(user::Model::is_local);
    let followee = state
        .store
        .find_user(followee_id)
        .await?
        .filter(|u| !u.is_local());

    Ok(match (follower, followee) {
        (Some(follower), Some(followee)) => followee
            .uri
            .map(|uri| (state.local.urls.user_url(&follower.id), uri)),
        _ => None,
    })
}
