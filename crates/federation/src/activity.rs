//! Typed inbox activities, validated at the inbox boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors for inbox payloads that do not have the shape of an activity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivityError {
    #[error("Body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("Activity must be a JSON object")]
    NotAnObject,
    #[error("Activity has no string type")]
    MissingType,
    #[error("Activity has no valid actor")]
    InvalidActor,
    #[error("{0} activity has no object")]
    MissingObject(&'static str),
    #[error("{0} activity has an invalid object")]
    InvalidObject(&'static str),
    #[error("Move activity has no valid target")]
    InvalidTarget,
}

/// An activity whose semantics live in its `object`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectActivity {
    pub id: Option<String>,
    pub actor: String,
    pub object: Value,
    pub raw: Value,
}

/// `Like` or `EmojiReact` towards a note.
#[derive(Debug, Clone, PartialEq)]
pub struct LikeActivity {
    pub id: Option<String>,
    pub actor: String,
    /// URI of the liked object.
    pub object: String,
    /// Reaction content, if any.
    pub content: Option<String>,
    pub raw: Value,
}

/// Account migration to `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveActivity {
    pub id: Option<String>,
    pub actor: String,
    pub target: String,
    pub raw: Value,
}

/// An inbound activity, one variant per handled type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub enum InboxActivity {
    Create(ObjectActivity),
    Update(ObjectActivity),
    Delete(ObjectActivity),
    Follow(ObjectActivity),
    Accept(ObjectActivity),
    Reject(ObjectActivity),
    Undo(ObjectActivity),
    Announce(ObjectActivity),
    Add(ObjectActivity),
    Remove(ObjectActivity),
    Block(ObjectActivity),
    Flag(ObjectActivity),
    Like(LikeActivity),
    EmojiReact(LikeActivity),
    Move(MoveActivity),
    /// A type this server does not handle, passed through as is.
    Unknown(Value),
}

impl InboxActivity {
    /// Parse a request body, dropping prototype-pollution keys before validation.
    pub fn parse(body: &[u8]) -> Result<Self, ActivityError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ActivityError::InvalidJson(e.to_string()))?;
        Self::try_from(sanitize(value))
    }

    /// The `type` of the activity.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Create(_) => "Create",
            Self::Update(_) => "Update",
            Self::Delete(_) => "Delete",
            Self::Follow(_) => "Follow",
            Self::Accept(_) => "Accept",
            Self::Reject(_) => "Reject",
            Self::Undo(_) => "Undo",
            Self::Announce(_) => "Announce",
            Self::Add(_) => "Add",
            Self::Remove(_) => "Remove",
            Self::Block(_) => "Block",
            Self::Flag(_) => "Flag",
            Self::Like(_) => "Like",
            Self::EmojiReact(_) => "EmojiReact",
            Self::Move(_) => "Move",
            Self::Unknown(raw) => raw.get("type").and_then(Value::as_str).unwrap_or_default(),
        }
    }

    /// URI of the actor performing the activity.
    #[must_use]
    pub fn actor(&self) -> &str {
        match self {
            Self::Create(a)
            | Self::Update(a)
            | Self::Delete(a)
            | Self::Follow(a)
            | Self::Accept(a)
            | Self::Reject(a)
            | Self::Undo(a)
            | Self::Announce(a)
            | Self::Add(a)
            | Self::Remove(a)
            | Self::Block(a)
            | Self::Flag(a) => &a.actor,
            Self::Like(a) | Self::EmojiReact(a) => &a.actor,
            Self::Move(a) => &a.actor,
            Self::Unknown(raw) => raw.get("actor").and_then(id_of).unwrap_or_default(),
        }
    }

    /// The sanitized JSON document.
    #[must_use]
    pub fn raw(&self) -> &Value {
        match self {
            Self::Create(a)
            | Self::Update(a)
            | Self::Delete(a)
            | Self::Follow(a)
            | Self::Accept(a)
            | Self::Reject(a)
            | Self::Undo(a)
            | Self::Announce(a)
            | Self::Add(a)
            | Self::Remove(a)
            | Self::Block(a)
            | Self::Flag(a) => &a.raw,
            Self::Like(a) | Self::EmojiReact(a) => &a.raw,
            Self::Move(a) => &a.raw,
            Self::Unknown(raw) => raw,
        }
    }

    fn object_activity(
        kind: &'static str,
        id: Option<String>,
        actor: String,
        raw: Value,
    ) -> Result<ObjectActivity, ActivityError> {
        let object = match raw.get("object") {
            None | Some(Value::Null) => return Err(ActivityError::MissingObject(kind)),
            Some(object) => object.clone(),
        };
        Ok(ObjectActivity {
            id,
            actor,
            object,
            raw,
        })
    }

    fn like_activity(
        kind: &'static str,
        id: Option<String>,
        actor: String,
        raw: Value,
    ) -> Result<LikeActivity, ActivityError> {
        let object = raw
            .get("object")
            .ok_or(ActivityError::MissingObject(kind))?;
        let object = id_of(object)
            .ok_or(ActivityError::InvalidObject(kind))?
            .to_string();
        let content = raw
            .get("content")
            .or_else(|| raw.get("_misskey_reaction"))
            .and_then(Value::as_str)
            .map(ToString::to_string);
        Ok(LikeActivity {
            id,
            actor,
            object,
            content,
            raw,
        })
    }
}

impl TryFrom<Value> for InboxActivity {
    type Error = ActivityError;

    fn try_from(raw: Value) -> Result<Self, Self::Error> {
        let Value::Object(ref map) = raw else {
            return Err(ActivityError::NotAnObject);
        };
        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ActivityError::MissingType)?
            .to_string();
        let actor = map
            .get("actor")
            .and_then(id_of)
            .ok_or(ActivityError::InvalidActor)?
            .to_string();
        let id = map.get("id").and_then(Value::as_str).map(ToString::to_string);

        let activity = match kind.as_str() {
            "Create" => Self::Create(Self::object_activity("Create", id, actor, raw)?),
            "Update" => Self::Update(Self::object_activity("Update", id, actor, raw)?),
            "Delete" => Self::Delete(Self::object_activity("Delete", id, actor, raw)?),
            "Follow" => Self::Follow(Self::object_activity("Follow", id, actor, raw)?),
            "Accept" => Self::Accept(Self::object_activity("Accept", id, actor, raw)?),
            "Reject" => Self::Reject(Self::object_activity("Reject", id, actor, raw)?),
            "Undo" => Self::Undo(Self::object_activity("Undo", id, actor, raw)?),
            "Announce" => Self::Announce(Self::object_activity("Announce", id, actor, raw)?),
            "Add" => Self::Add(Self::object_activity("Add", id, actor, raw)?),
            "Remove" => Self::Remove(Self::object_activity("Remove", id, actor, raw)?),
            "Block" => Self::Block(Self::object_activity("Block", id, actor, raw)?),
            "Flag" => Self::Flag(Self::object_activity("Flag", id, actor, raw)?),
            "Like" => Self::Like(Self::like_activity("Like", id, actor, raw)?),
            "EmojiReact" => Self::EmojiReact(Self::like_activity("EmojiReact", id, actor, raw)?),
            "Move" => {
                let target = raw
                    .get("target")
                    .and_then(id_of)
                    .ok_or(ActivityError::InvalidTarget)?
                    .to_string();
                Self::Move(MoveActivity {
                    id,
                    actor,
                    target,
                    raw,
                })
            }
            _ => Self::Unknown(raw),
        };
        Ok(activity)
    }
}

impl From<InboxActivity> for Value {
    fn from(activity: InboxActivity) -> Self {
        match activity {
            InboxActivity::Create(a)
            | InboxActivity::Update(a)
            | InboxActivity::Delete(a)
            | InboxActivity::Follow(a)
            | InboxActivity::Accept(a)
            | InboxActivity::Reject(a)
            | InboxActivity::Undo(a)
            | InboxActivity::Announce(a)
            | InboxActivity::Add(a)
            | InboxActivity::Remove(a)
            | InboxActivity::Block(a)
            | InboxActivity::Flag(a) => a.raw,
            InboxActivity::Like(a) | InboxActivity::EmojiReact(a) => a.raw,
            InboxActivity::Move(a) => a.raw,
            InboxActivity::Unknown(raw) => raw,
        }
    }
}

/// A string, or the string `id` of an object.
fn id_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("id").and_then(Value::as_str),
        _ => None,
    }
}

/// Recursively drop keys that would redefine prototype behavior.
///
/// `__proto__` is always removed; `constructor` is removed when its value is
/// an object holding `prototype`.
#[must_use]
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sanitize_map(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        other => other,
    }
}

fn sanitize_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(key, value)| match key.as_str() {
            "__proto__" => false,
            "constructor" => !value
                .as_object()
                .is_some_and(|inner| inner.contains_key("prototype")),
            _ => true,
        })
        .map(|(key, value)| (key, sanitize(value)))
        .collect()
}
