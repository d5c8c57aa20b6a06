//! Actor documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actor type: bots are `Service`, system accounts `Application`.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ApActorKind {
    Person,
    Service,
    Application,
}

/// `ActivityPub` actor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApPerson {
    #[serde(rename = "type")]
    pub kind: ApActorKind,
    pub id: String,
    pub preferred_username: String,
    pub inbox: String,
    pub outbox: String,
    pub followers: String,
    pub following: String,
    pub featured: String,
    pub endpoints: ApEndpoints,
    pub url: String,
    pub manually_approves_followers: bool,
    pub public_key: ApPublicKey,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(rename = "_misskey_summary", skip_serializing_if = "Option::is_none")]
    pub misskey_summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<ApImage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ApImage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
}

/// Shared endpoints of an actor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApEndpoints {
    pub shared_inbox: String,
}

/// `ActivityPub` Image object.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApImage {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

impl ApImage {
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            kind: "Image".to_string(),
            url,
        }
    }
}

/// `ActivityPub` public key.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApPublicKey {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub owner: String,
    pub public_key_pem: String,
}

impl ApPublicKey {
    #[must_use]
    pub fn new(id: String, owner: String, public_key_pem: String) -> Self {
        Self {
            id,
            kind: "Key".to_string(),
            owner,
            public_key_pem,
        }
    }
}
