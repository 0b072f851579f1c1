use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::Connection;
use tomato_core::ids::TopologyId;
use tomato_topology::error::TopologyError;
use tomato_topology::store::TopologyStore;
use tomato_topology::timeout::TimeoutStep;
use tomato_topology::topology::Topology;

use crate::error::StorageError;

/// Async SQLite-backed store for [`Topology`] aggregates. Each topology is
/// persisted whole as a JSON blob (it already round-trips through
/// `serde_json` for `client_data`/attributes), with `name`, `timeout`, and
/// `timeout_step` pulled out into indexed columns so the reaper's sweeps
/// and name lookups don't require loading and deserializing every row.
pub struct SqliteTopologyStore {
    conn: Connection,
}

impl SqliteTopologyStore {
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

                    CREATE TABLE IF NOT EXISTS topologies (
                        id           TEXT PRIMARY KEY,
                        name         TEXT NOT NULL,
                        timeout      TEXT NOT NULL,
                        timeout_step INTEGER NOT NULL,
                        data         TEXT NOT NULL
                    );

                    CREATE INDEX IF NOT EXISTS idx_topologies_name
                        ON topologies(name);
                    CREATE INDEX IF NOT EXISTS idx_topologies_timeout
                        ON topologies(timeout, timeout_step);
                    ",
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)
    }
}

#[async_trait]
impl TopologyStore for SqliteTopologyStore {
    async fn get(&self, id: TopologyId) -> Result<Topology, TopologyError> {
        let id_str = id.to_string();
        let data: Option<String> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT data FROM topologies WHERE id = ?1")?;
                let mut rows = stmt.query(rusqlite::params![id_str])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row.get::<_, String>(0)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(StorageError::from)?;

        let data = data.ok_or(TopologyError::NotFound(id))?;
        serde_json::from_str(&data)
            .map_err(|e| StorageError::from(e).into())
    }

    async fn save(&self, topology: &Topology) -> Result<(), TopologyError> {
        let id = topology.id.to_string();
        let name = topology.name.clone();
        let timeout = topology.timeout.to_rfc3339();
        let timeout_step = topology.timeout_step.as_u8() as i64;
        let data = serde_json::to_string(topology).map_err(StorageError::from)?;

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO topologies (id, name, timeout, timeout_step, data)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                        name=excluded.name, timeout=excluded.timeout,
                        timeout_step=excluded.timeout_step, data=excluded.data",
                    rusqlite::params![id, name, timeout, timeout_step, data],
                )?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn remove(&self, id: TopologyId) -> Result<(), TopologyError> {
        let id_str = id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM topologies WHERE id = ?1", rusqlite::params![id_str])?;
                Ok(())
            })
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TopologyId>, TopologyError> {
        let ids: Vec<String> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id FROM topologies")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(StorageError::from)?;

        ids.into_iter()
            .map(|s| {
                s.parse::<TopologyId>()
                    .map_err(|_| TopologyError::InvalidValue(format!("corrupt topology id: {s}")))
            })
            .collect()
    }

    async fn list_by_step(&self, step: TimeoutStep) -> Result<Vec<TopologyId>, TopologyError> {
        let step = step.as_u8() as i64;
        let ids: Vec<String> = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT id FROM topologies WHERE timeout_step = ?1")?;
                let rows = stmt.query_map(rusqlite::params![step], |row| row.get::<_, String>(0))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(StorageError::from)?;

        ids.into_iter()
            .map(|s| {
                s.parse::<TopologyId>()
                    .map_err(|_| TopologyError::InvalidValue(format!("corrupt topology id: {s}")))
            })
            .collect()
    }
}
