//! Custom emoji.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ApImage;

/// `toot:Emoji` object.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApEmoji {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    /// Shortcode wrapped in colons.
    pub name: String,
    pub updated: DateTime<Utc>,
    pub icon: ApEmojiIcon,
}

/// Icon of an emoji, with its media type.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApEmojiIcon {
    #[serde(flatten)]
    pub image: ApImage,
    pub media_type: String,
}
