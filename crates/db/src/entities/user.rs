//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub username: String,

    pub username_lower: String,

    /// NULL = local user, Some(host) = remote user
    #[sea_orm(nullable)]
    pub host: Option<String>,

    /// Display name
    #[sea_orm(nullable)]
    pub name: Option<String>,

    /// Profile description
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(nullable)]
    pub avatar_url: Option<String>,

    #[sea_orm(nullable)]
    pub banner_url: Option<String>,

    #[sea_orm(default_value = false)]
    pub is_bot: bool,

    /// Requires follow approval
    #[sea_orm(default_value = false)]
    pub is_locked: bool,

    #[sea_orm(default_value = false)]
    pub is_suspended: bool,

    /// Account deletion in progress or finished
    #[sea_orm(default_value = false)]
    pub is_deleted: bool,

    /// `ActivityPub` inbox URL (remote users)
    #[sea_orm(nullable)]
    pub inbox: Option<String>,

    /// `ActivityPub` shared inbox URL (remote users)
    #[sea_orm(nullable)]
    pub shared_inbox: Option<String>,

    /// `ActivityPub` featured collection URL
    #[sea_orm(nullable)]
    pub featured: Option<String>,

    /// `ActivityPub` URI (remote users)
    #[sea_orm(unique, nullable)]
    pub uri: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether this user belongs to this instance.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.host.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::note::Entity")]
    Notes,

    #[sea_orm(has_one = "super::user_profile::Entity")]
    Profile,

    #[sea_orm(has_one = "super::user_keypair::Entity")]
    Keypair,

    #[sea_orm(has_one = "super::user_publickey::Entity")]
    Publickey,
}

impl Related<super::note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notes.def()
    }
}

impl Related<super::user_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl Related<super::user_keypair::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Keypair.def()
    }
}

impl Related<super::user_publickey::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Publickey.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
