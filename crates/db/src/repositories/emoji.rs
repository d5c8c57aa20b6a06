//! Custom emoji repository.

use std::sync::Arc;

use crate::entities::{Emoji, emoji};
use apserve_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Emoji repository for database operations.
#[derive(Clone)]
pub struct EmojiRepository {
    db: Arc<DatabaseConnection>,
}

impl EmojiRepository {
    /// Create a new emoji repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a local emoji by shortcode.
    pub async fn find_local_by_name(&self, name: &str) -> AppResult<Option<emoji::Model>> {
        Emoji::find()
            .filter(emoji::Column::Name.eq(name))
            .filter(emoji::Column::Host.is_null())
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_local_by_name() {
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
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[emoji.clone()]])
                .into_connection(),
        );

        let repo = EmojiRepository::new(db);
        assert_eq!(repo.find_local_by_name("blobcat").await.unwrap(), Some(emoji));
    }
}
