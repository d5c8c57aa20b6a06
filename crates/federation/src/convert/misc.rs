//! Emoji, like and follow rendering.

use apserve_db::entities::{emoji, reaction};

use crate::local::UrlConfig;
use crate::objects::{ApActivity, ApActivityKind, ApEmoji, ApEmojiIcon, ApImage, ApObjectRef};

/// Extension trait for rendering custom emojis.
pub trait EmojiToApEmoji {
    fn to_ap_emoji(&self, urls: &UrlConfig) -> ApEmoji;
}

impl EmojiToApEmoji for emoji::Model {
    fn to_ap_emoji(&self, urls: &UrlConfig) -> ApEmoji {
        ApEmoji {
            kind: "Emoji".to_string(),
            id: urls.emoji_url(&self.name),
            name: format!(":{}:", self.name),
            updated: self.updated_at.unwrap_or(self.created_at),
            icon: ApEmojiIcon {
                image: ApImage::new(
                    self.public_url
                        .clone()
                        .unwrap_or_else(|| self.original_url.clone()),
                ),
                media_type: self.content_type.clone(),
            },
        }
    }
}

/// `Like` for a reaction to the note at `note_uri`.
#[must_use]
pub fn render_like(reaction: &reaction::Model, urls: &UrlConfig, note_uri: String) -> ApActivity {
    let mut like = ApActivity::new(
        ApActivityKind::Like,
        urls.like_url(&reaction.id),
        urls.user_url(&reaction.user_id),
        ApObjectRef::Uri(note_uri),
    );
    like.content = Some(reaction.reaction.clone());
    like.misskey_reaction = Some(reaction.reaction.clone());
    like
}

/// `Follow` from `follower` to `followee`, identified by `id`.
#[must_use]
pub fn render_follow(id: String, follower: String, followee: String) -> ApActivity {
    ApActivity::new(
        ApActivityKind::Follow,
        id,
        follower,
        ApObjectRef::Uri(followee),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::test_identity;
    use chrono::Utc;

    #[test]
    fn test_emoji() {
        let urls = test_identity().urls;
        let emoji = emoji::Model {
            id: "e1".to_string(),
            name: "blobcat".to_string(),
            host: None,
            original_url: "https://local.example/files/blobcat.png".to_string(),
            public_url: None,
            content_type: "image/png".to_string(),
            local_only: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        let json = serde_json::to_value(emoji.to_ap_emoji(&urls)).unwrap();
        assert_eq!(json["id"], "https://local.example/emojis/blobcat");
        assert_eq!(json["name"], ":blobcat:");
        assert_eq!(json["icon"]["type"], "Image");
        assert_eq!(json["icon"]["mediaType"], "image/png");
        assert_eq!(json["icon"]["url"], "https://local.example/files/blobcat.png");
    }

    #[test]
    fn test_like() {
        let urls = test_identity().urls;
        let reaction = reaction::Model {
            id: "r1".to_string(),
            user_id: "u1".to_string(),
            note_id: "n1".to_string(),
            reaction: "👍".to_string(),
            created_at: Utc::now().into(),
        };
        let like = render_like(&reaction, &urls, "https://remote.example/notes/x".to_string());
        let json = serde_json::to_value(&like).unwrap();
        assert_eq!(json["type"], "Like");
        assert_eq!(json["id"], "https://local.example/likes/r1");
        assert_eq!(json["_misskey_reaction"], "👍");
        assert!(json.get("to").is_none());
    }
}
