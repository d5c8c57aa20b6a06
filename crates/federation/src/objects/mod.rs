//! `ActivityPub` object types served by this instance.

#![allow(missing_docs)]

mod activity;
mod actor;
mod collection;
mod emoji;
mod note;

pub use activity::{ApActivity, ApActivityKind, ApObjectRef};
pub use actor::{ApActorKind, ApEndpoints, ApImage, ApPerson, ApPublicKey};
pub use collection::{OrderedCollection, OrderedCollectionPage};
pub use emoji::{ApEmoji, ApEmojiIcon};
pub use note::ApNote;

use serde::Serialize;
use serde_json::Value;

/// The public addressing collection.
pub const PUBLIC_COLLECTION: &str = "https://www.w3.org/ns/activitystreams#Public";

/// JSON-LD context attached to every top-level document.
#[must_use]
pub fn activitystreams_context() -> Value {
    serde_json::json!([
        "https://www.w3.org/ns/activitystreams",
        "https://w3id.org/security/v1",
        {
            "manuallyApprovesFollowers": "as:manuallyApprovesFollowers",
            "sensitive": "as:sensitive",
            "Hashtag": "as:Hashtag",
            "quoteUrl": "as:quoteUrl",
            "toot": "http://joinmastodon.org/ns#",
            "Emoji": "toot:Emoji",
            "featured": "toot:featured",
            "discoverable": "toot:discoverable",
            "misskey": "https://misskey-hub.net/ns#",
            "_misskey_content": "misskey:_misskey_content",
            "_misskey_quote": "misskey:_misskey_quote",
            "_misskey_reaction": "misskey:_misskey_reaction",
            "_misskey_summary": "misskey:_misskey_summary"
        }
    ])
}

/// A top-level document: `@context` followed by the object's fields.
#[derive(Debug, Clone, Serialize)]
pub struct WithContext<T> {
    #[serde(rename = "@context")]
    pub context: Value,
    #[serde(flatten)]
    pub inner: T,
}

impl<T> WithContext<T> {
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self {
            context: activitystreams_context(),
            inner,
        }
    }
}
