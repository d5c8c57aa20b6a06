//! Note entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Note visibility levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[sea_orm(string_value = "public")]
    Public,
    #[sea_orm(string_value = "home")]
    Home,
    #[sea_orm(string_value = "followers")]
    Followers,
    #[sea_orm(string_value = "specified")]
    Specified,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "note")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub user_id: String,

    /// Author host (denormalized), NULL for local notes
    #[sea_orm(nullable)]
    pub user_host: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub text: Option<String>,

    /// Content warning
    #[sea_orm(nullable)]
    pub cw: Option<String>,

    pub visibility: Visibility,

    /// Never federated when set
    #[sea_orm(default_value = false)]
    pub local_only: bool,

    #[sea_orm(nullable, indexed)]
    pub reply_id: Option<String>,

    #[sea_orm(nullable, indexed)]
    pub renote_id: Option<String>,

    /// Attached drive file IDs
    #[sea_orm(column_type = "JsonBinary")]
    pub file_ids: Json,

    #[sea_orm(default_value = false)]
    pub has_poll: bool,

    /// `ActivityPub` URI (remote notes)
    #[sea_orm(nullable)]
    pub uri: Option<String>,

    #[sea_orm(nullable)]
    pub url: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// A renote with no content of its own.
    #[must_use]
    pub fn is_pure_renote(&self) -> bool {
        self.renote_id.is_some()
            && self.text.is_none()
            && self.cw.is_none()
            && !self.has_poll
            && self.file_ids.as_array().is_none_or(Vec::is_empty)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,

    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::RenoteId",
        to = "Column::Id"
    )]
    Renote,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn note(text: Option<&str>, renote_id: Option<&str>, files: Json) -> Model {
        Model {
            id: "n1".to_string(),
            user_id: "u1".to_string(),
            user_host: None,
            text: text.map(ToString::to_string),
            cw: None,
            visibility: Visibility::Public,
            local_only: false,
            reply_id: None,
            renote_id: renote_id.map(ToString::to_string),
            file_ids: files,
            has_poll: false,
            uri: None,
            url: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_pure_renote() {
        assert!(note(None, Some("n0"), json!([])).is_pure_renote());
        assert!(!note(Some("quote"), Some("n0"), json!([])).is_pure_renote());
        assert!(!note(None, Some("n0"), json!(["f1"])).is_pure_renote());
        assert!(!note(None, None, json!([])).is_pure_renote());
    }
}
