//! Pinned note repository.

use std::sync::Arc;

use crate::entities::{UserNotePining, user_note_pining};
use apserve_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

/// Repository for notes pinned to a user's profile.
#[derive(Clone)]
pub struct UserNotePiningRepository {
    db: Arc<DatabaseConnection>,
}

impl UserNotePiningRepository {
    /// Create a new pinned note repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Pins of a user, most recently pinned first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<user_note_pining::Model>> {
        UserNotePining::find()
            .filter(user_note_pining::Column::UserId.eq(user_id))
            .order_by_desc(user_note_pining::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
