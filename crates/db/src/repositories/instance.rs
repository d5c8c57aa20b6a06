//! Instance repository.

use std::sync::Arc;

use crate::entities::{Instance, instance};
use apserve_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};

/// Instance repository for database operations.
#[derive(Clone)]
pub struct InstanceRepository {
    db: Arc<DatabaseConnection>,
}

impl InstanceRepository {
    /// Create a new instance repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Hosts of all blocked instances.
    pub async fn blocked_hosts(&self) -> AppResult<Vec<String>> {
        self.hosts_where(instance::Column::IsBlocked).await
    }

    /// Hosts of all silenced instances.
    pub async fn silenced_hosts(&self) -> AppResult<Vec<String>> {
        self.hosts_where(instance::Column::IsSilenced).await
    }

    async fn hosts_where(&self, flag: instance::Column) -> AppResult<Vec<String>> {
        Instance::find()
            .select_only()
            .column(instance::Column::Host)
            .filter(flag.eq(true))
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn host_row(host: &str) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("host", Value::from(host.to_string()))])
    }

    #[tokio::test]
    async fn test_blocked_hosts() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[host_row("evil.example"), host_row("spam.example")]])
                .into_connection(),
        );

        let repo = InstanceRepository::new(db);
        let hosts = repo.blocked_hosts().await.unwrap();
        assert_eq!(hosts, vec!["evil.example", "spam.example"]);
    }
}
