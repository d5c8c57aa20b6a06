//! Note repository.

use std::sync::Arc;

use crate::entities::{Note, note};
use apserve_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Note repository for database operations.
#[derive(Clone)]
pub struct NoteRepository {
    db: Arc<DatabaseConnection>,
}

/// Notes of `user_id` that may be federated in collection views.
fn federated_by_user(user_id: &str) -> Condition {
    Condition::all()
        .add(note::Column::UserId.eq(user_id))
        .add(note::Column::LocalOnly.eq(false))
        .add(
            Condition::any()
                .add(note::Column::Visibility.eq(note::Visibility::Public))
                .add(note::Column::Visibility.eq(note::Visibility::Home)),
        )
}

impl NoteRepository {
    /// Create a new note repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a note by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<note::Model>> {
        Note::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find notes by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<note::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Note::find()
            .filter(note::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Public and home notes of a user for the outbox.
    ///
    /// With `since_id` the notes newer than it are returned oldest first;
    /// otherwise notes older than `until_id` (if any) are returned newest first.
    pub async fn find_federated_by_user(
        &self,
        user_id: &str,
        since_id: Option<&str>,
        until_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<note::Model>> {
        let mut query = Note::find().filter(federated_by_user(user_id));

        query = if let Some(since) = since_id {
            query
                .filter(note::Column::Id.gt(since))
                .order_by_asc(note::Column::Id)
        } else {
            if let Some(until) = until_id {
                query = query.filter(note::Column::Id.lt(until));
            }
            query.order_by_desc(note::Column::Id)
        };

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count public and home notes of a user.
    pub async fn count_federated_by_user(&self, user_id: &str) -> AppResult<u64> {
        Note::find()
            .filter(federated_by_user(user_id))
            .count(self.db.as_ref())
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
    use serde_json::json;

    fn create_test_note(id: &str, user_id: &str) -> note::Model {
        note::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            user_host: None,
            text: Some("hello".to_string()),
            cw: None,
            visibility: note::Visibility::Public,
            local_only: false,
            reply_id: None,
            renote_id: None,
            file_ids: json!([]),
            has_poll: false,
            uri: None,
            url: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_federated_by_user() {
        let n1 = create_test_note("n2", "u1");
        let n2 = create_test_note("n1", "u1");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[n1, n2]])
                .into_connection(),
        );

        let repo = NoteRepository::new(db);
        let notes = repo
            .find_federated_by_user("u1", None, Some("n3"), 21)
            .await
            .unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].id, "n2");
    }

    #[tokio::test]
    async fn test_find_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<note::Model>::new()])
                .into_connection(),
        );

        let repo = NoteRepository::new(db);
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }
}
