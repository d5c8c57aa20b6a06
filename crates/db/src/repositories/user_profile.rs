//! User profile repository.

use std::sync::Arc;

use crate::entities::{UserProfile, user_profile};
use apserve_common::{AppError, AppResult};
use sea_orm::{DatabaseConnection, EntityTrait};

/// User profile repository for database operations.
#[derive(Clone)]
pub struct UserProfileRepository {
    db: Arc<DatabaseConnection>,
}

impl UserProfileRepository {
    /// Create a new user profile repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a profile by user ID.
    pub async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<user_profile::Model>> {
        UserProfile::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::user_profile::FfVisibility;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_by_user_id() {
        let profile = user_profile::Model {
            user_id: "u1".to_string(),
            followers_visibility: FfVisibility::Private,
            following_visibility: FfVisibility::Public,
            url: None,
            created_at: Utc::now().into(),
            updated_at: None,
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[profile]])
                .into_connection(),
        );

        let repo = UserProfileRepository::new(db);
        let found = repo.find_by_user_id("u1").await.unwrap().unwrap();
        assert_eq!(found.followers_visibility, FfVisibility::Private);
    }
}
