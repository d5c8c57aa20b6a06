//! `ActivityPub` Note object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `ActivityPub` Note object.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApNote {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub attributed_to: String,
    pub content: String,
    pub published: DateTime<Utc>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub sensitive: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_url: Option<String>,

    #[serde(rename = "_misskey_quote", skip_serializing_if = "Option::is_none")]
    pub misskey_quote: Option<String>,

    #[serde(rename = "_misskey_content", skip_serializing_if = "Option::is_none")]
    pub misskey_content: Option<String>,
}
