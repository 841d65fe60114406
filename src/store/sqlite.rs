use super::{IdAllocator, VehicleStore, add_unique, remove_all};
use crate::db::Db;
use crate::engine::model::{CharacterId, NewVehicle, VehicleId, VehicleRecord, Vec3};
use crate::error::{AppError, AppResult};
use crate::error_ext::StorageContext;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Arc;
use tracing::{debug, info};

/// Vehicles collection stored as JSON documents in one SQLite table.
///
/// `owner_id`, `uid` and `plate` are mirrored into columns for indexing; the
/// `doc` column is the source of truth.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Db>,
    collection: String,
}

impl SqliteStore {
    /// Wrap a database handle and create the collection's tables if needed.
    pub async fn open(db: Arc<Db>, collection: &str) -> AppResult<Self> {
        validate_collection_name(collection)?;
        let collection = collection.to_string();
        let table = collection.clone();
        db.call(move |conn| ensure_collection(conn, &table)).await?;
        info!(collection = %collection, "Vehicle collection ready");
        Ok(Self { db, collection })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn mutate_keys<F>(&self, id: VehicleId, f: F) -> AppResult<Vec<CharacterId>>
    where
        F: FnOnce(&mut Vec<CharacterId>) + Send + 'static,
    {
        let table = self.collection.clone();
        self.db
            .call_mut(move |conn| {
                let tx = conn.transaction()?;
                let doc: Option<String> = tx
                    .query_row(
                        &format!(r#"SELECT doc FROM "{table}" WHERE id = ?1"#),
                        params![id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                let doc = doc.ok_or_else(|| AppError::NotFound(format!("vehicle {id}")))?;
                let mut record: VehicleRecord = serde_json::from_str(&doc)?;
                f(&mut record.key_holder_ids);
                tx.execute(
                    &format!(r#"UPDATE "{table}" SET doc = ?2 WHERE id = ?1"#),
                    params![id.to_string(), serde_json::to_string(&record)?],
                )?;
                tx.commit()?;
                Ok(record.key_holder_ids)
            })
            .await
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn validate_collection_name(name: &str) -> AppResult<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "collection name '{name}' must be an identifier"
        )))
    }
}

fn ensure_collection(conn: &Connection, table: &str) -> AppResult<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            id TEXT PRIMARY KEY,
            uid INTEGER NOT NULL UNIQUE,
            owner_id TEXT NOT NULL,
            plate TEXT NOT NULL,
            doc TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS "idx_{table}_owner" ON "{table}"(owner_id);
        CREATE INDEX IF NOT EXISTS "idx_{table}_plate" ON "{table}"(plate);
        CREATE TABLE IF NOT EXISTS "counters" (
            collection TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        "#
    ))?;
    Ok(())
}

fn parse_docs(docs: Vec<String>) -> AppResult<Vec<VehicleRecord>> {
    docs.iter()
        .map(|doc| serde_json::from_str(doc).storage_err("Corrupt vehicle document"))
        .collect()
}

#[async_trait]
impl VehicleStore for SqliteStore {
    async fn create(
        &self,
        vehicle: NewVehicle,
        uid: u64,
        plate: String,
    ) -> AppResult<VehicleRecord> {
        let record = vehicle.into_record(VehicleId::new(), uid, plate);
        let doc = serde_json::to_string(&record)?;
        let table = self.collection.clone();
        let row = (
            record.id.to_string(),
            record.uid as i64,
            record.owner_id.to_string(),
            record.plate.clone(),
        );
        self.db
            .call(move |conn| {
                conn.execute(
                    &format!(
                        r#"INSERT INTO "{table}" (id, uid, owner_id, plate, doc)
                           VALUES (?1, ?2, ?3, ?4, ?5)"#
                    ),
                    params![row.0, row.1, row.2, row.3, doc],
                )?;
                Ok(())
            })
            .await?;
        debug!(vehicle = %record.id, uid = record.uid, "Vehicle document created");
        Ok(record)
    }

    async fn get(&self, id: VehicleId) -> AppResult<Option<VehicleRecord>> {
        let table = self.collection.clone();
        let doc: Option<String> = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!(r#"SELECT doc FROM "{table}" WHERE id = ?1"#),
                        params![id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        Ok(parse_docs(doc.into_iter().collect())?.pop())
    }

    async fn accessible_to(&self, character: &CharacterId) -> AppResult<Vec<VehicleRecord>> {
        let table = self.collection.clone();
        let character = character.to_string();
        let docs = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&format!(
                    r#"SELECT doc FROM "{table}"
                       WHERE owner_id = ?1
                          OR EXISTS (
                              SELECT 1 FROM json_each("{table}".doc, '$.keyHolderIds')
                              WHERE json_each.value = ?1
                          )
                       ORDER BY uid"#
                ))?;
                let rows = stmt.query_map(params![character], |row| row.get::<_, String>(0))?;
                let docs = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(docs)
            })
            .await?;
        parse_docs(docs)
    }

    async fn plate_exists(&self, plate: &str) -> AppResult<bool> {
        let table = self.collection.clone();
        let plate = plate.to_string();
        self.db
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    &format!(r#"SELECT EXISTS (SELECT 1 FROM "{table}" WHERE plate = ?1)"#),
                    params![plate],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
    }

    async fn update_placement(
        &self,
        id: VehicleId,
        position: Vec3,
        rotation: Vec3,
    ) -> AppResult<()> {
        let table = self.collection.clone();
        let position = serde_json::to_string(&position)?;
        let rotation = serde_json::to_string(&rotation)?;
        let changed = self
            .db
            .call(move |conn| {
                Ok(conn.execute(
                    &format!(
                        r#"UPDATE "{table}"
                           SET doc = json_set(doc, '$.position', json(?2), '$.rotation', json(?3))
                           WHERE id = ?1"#
                    ),
                    params![id.to_string(), position, rotation],
                )?)
            })
            .await?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("vehicle {id}")));
        }
        Ok(())
    }

    async fn add_key_holder(
        &self,
        id: VehicleId,
        character: &CharacterId,
    ) -> AppResult<Vec<CharacterId>> {
        let character = character.clone();
        self.mutate_keys(id, move |keys| add_unique(keys, &character))
            .await
    }

    async fn remove_key_holder(
        &self,
        id: VehicleId,
        character: &CharacterId,
    ) -> AppResult<Vec<CharacterId>> {
        let character = character.clone();
        self.mutate_keys(id, move |keys| remove_all(keys, &character))
            .await
    }

    async fn destroy(&self, id: VehicleId) -> AppResult<bool> {
        let table = self.collection.clone();
        let deleted = self
            .db
            .call(move |conn| {
                Ok(conn.execute(
                    &format!(r#"DELETE FROM "{table}" WHERE id = ?1"#),
                    params![id.to_string()],
                )?)
            })
            .await?;
        Ok(deleted > 0)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[async_trait]
impl IdAllocator for SqliteStore {
    async fn next_id(&self, collection: &str) -> AppResult<u64> {
        let collection = collection.to_string();
        let value: i64 = self
            .db
            .call(move |conn| {
                Ok(conn.query_row(
                    r#"INSERT INTO "counters" (collection, value) VALUES (?1, 1)
                       ON CONFLICT(collection) DO UPDATE SET value = value + 1
                       RETURNING value"#,
                    params![collection],
                    |row| row.get(0),
                )?)
            })
            .await?;
        Ok(value as u64)
    }
}
