//! Activities served by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ApNote;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ApActivityKind {
    Create,
    Announce,
    Like,
    Follow,
}

/// The object of an activity: a reference or an embedded note.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ApObjectRef {
    Uri(String),
    Note(Box<ApNote>),
}

/// `ActivityPub` activity.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApActivity {
    #[serde(rename = "type")]
    pub kind: ApActivityKind,
    pub id: String,
    pub actor: String,
    pub object: ApObjectRef,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub to: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub cc: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(rename = "_misskey_reaction", skip_serializing_if = "Option::is_none")]
    pub misskey_reaction: Option<String>,
}

impl ApActivity {
    #[must_use]
    pub const fn new(kind: ApActivityKind, id: String, actor: String, object: ApObjectRef) -> Self {
        Self {
            kind,
            id,
            actor,
            object,
            published: None,
            to: Vec::new(),
            cc: Vec::new(),
            content: None,
            misskey_reaction: None,
        }
    }
}
