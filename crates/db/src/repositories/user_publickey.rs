//! Remote public key repository.

use std::sync::Arc;

use crate::entities::{UserPublickey, user_publickey};
use apserve_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};

/// Repository for public keys published by remote actors.
#[derive(Clone)]
pub struct UserPublickeyRepository {
    db: Arc<DatabaseConnection>,
}

impl UserPublickeyRepository {
    /// Create a new public key repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a key by its `keyId`.
    pub async fn find_by_key_id(&self, key_id: &str) -> AppResult<Option<user_publickey::Model>> {
        UserPublickey::find()
            .filter(user_publickey::Column::KeyId.eq(key_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the key owned by a remote user.
    pub async fn find_by_user_id(
        &self,
        user_id: &str,
    ) -> AppResult<Option<user_publickey::Model>> {
        UserPublickey::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert or replace the key of a remote user.
    pub async fn upsert(&self, key: user_publickey::Model) -> AppResult<()> {
        let model = user_publickey::ActiveModel {
            user_id: Set(key.user_id),
            key_id: Set(key.key_id),
            key_pem: Set(key.key_pem),
        };

        UserPublickey::insert(model)
            .on_conflict(
                OnConflict::column(user_publickey::Column::UserId)
                    .update_columns([
                        user_publickey::Column::KeyId,
                        user_publickey::Column::KeyPem,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
