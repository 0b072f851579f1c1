use std::path::Path;

use async_trait::async_trait;
use tokio_rusqlite::Connection;
use tomato_accounting::error::AccountingError;
use tomato_accounting::statistics::UsageStatistics;
use tomato_accounting::store::UsageStore;
use tomato_core::ids::StatisticsId;

use crate::error::StorageError;

/// Async SQLite-backed store for [`UsageStatistics`]. Like the topology
/// store, the whole rolled-up history is kept as one JSON blob per
/// statistic rather than one row per [`tomato_accounting::record::UsageRecord`] — a
/// statistic's entire retained history is always read and written as a
/// unit, so there is nothing finer-grained to index on.
pub struct SqliteUsageStore {
    conn: Connection,
}

impl SqliteUsageStore {
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref()).await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn new_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                    PRAGMA busy_timeout=5000;

                    CREATE TABLE IF NOT EXISTS usage_statistics (
                        statistics_id TEXT PRIMARY KEY,
                        data          TEXT NOT NULL
                    );
                    ",
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)
    }
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    async fn get(&self, id: StatisticsId) -> Result<UsageStatistics, AccountingError> {
        let id_str = id.to_string();
        let data: Option<String> = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT data FROM usage_statistics WHERE statistics_id = ?1")?;
                let mut rows = stmt.query(rusqlite::params![id_str])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row.get::<_, String>(0)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(StorageError::from)
            .map_err(AccountingError::from)?;

        match data {
            // A statistic that has never been sampled has no row yet; an
            // empty history is the correct initial value, not an error.
            None => Ok(UsageStatistics::with_id(id)),
            Some(data) => serde_json::from_str(&data)
                .map_err(StorageError::from)
                .map_err(AccountingError::from),
        }
    }

    async fn save(&self, stats: &UsageStatistics) -> Result<(), AccountingError> {
        let id = stats.id.to_string();
        let data = serde_json::to_string(stats)
            .map_err(StorageError::from)
            .map_err(AccountingError::from)?;

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO usage_statistics (statistics_id, data) VALUES (?1, ?2)
                     ON CONFLICT(statistics_id) DO UPDATE SET data=excluded.data",
                    rusqlite::params![id, data],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)
            .map_err(AccountingError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tomato_core::measurement::Measurement;

    #[tokio::test]
    async fn get_on_an_unsampled_statistic_returns_an_empty_history() {
        let store = SqliteUsageStore::new_in_memory().await.unwrap();
        let id = StatisticsId::new();
        let stats = store.get(id).await.unwrap();
        assert_eq!(stats.id, id);
        assert!(stats.last_single().is_none());
    }

    #[tokio::test]
    async fn save_and_get_round_trips_a_sampled_statistic() {
        let store = SqliteUsageStore::new_in_memory().await.unwrap();
        let mut stats = UsageStatistics::new();
        let id = stats.id;
        let now = Utc::now();
        stats.update(Measurement::default(), now, now + chrono::Duration::seconds(60));

        store.save(&stats).await.unwrap();
        let loaded = store.get(id).await.unwrap();
        assert!(loaded.last_single().is_some());
    }

    #[tokio::test]
    async fn save_upserts_rather_than_duplicates() {
        let store = SqliteUsageStore::new_in_memory().await.unwrap();
        let mut stats = UsageStatistics::new();
        let now = Utc::now();
        stats.update(Measurement::default(), now, now + chrono::Duration::seconds(60));
        store.save(&stats).await.unwrap();
        stats.update(
            Measurement::default(),
            now + chrono::Duration::seconds(60),
            now + chrono::Duration::seconds(120),
        );
        store.save(&stats).await.unwrap();

        let loaded = store.get(stats.id).await.unwrap();
        assert_eq!(loaded.records(tomato_accounting::bucket::BucketType::Single).len(), 2);
    }
}
