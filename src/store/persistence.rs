//! Persistence layer for the Actor Store

use crate::error::StorageError;
use crate::store::{ActorRecord, ActorStore};
use bincode;
use parking_lot::Mutex;
use sled;
use std::path::Path;

const TREE_ACTORS: &str = "actor_profiles";

/// Sled-based implementation of ActorStore
pub struct SledActorStore {
    db: sled::Db,
    actors: sled::Tree,
    write_lock: Mutex<()>,
}

impl SledActorStore {
    /// Open (or create) a store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::io(format!("Failed to open sled database: {}", e))
        })?;
        Self::from_db(db)
    }

    /// Share an already-open database with other stores
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let actors = db.open_tree(TREE_ACTORS).map_err(StorageError::io)?;
        Ok(Self {
            db,
            actors,
            write_lock: Mutex::new(()),
        })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn encode(record: &ActorRecord) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(record)
            .map_err(|e| StorageError::data(format!("Failed to serialize actor record: {}", e)))
    }

    fn decode(raw: &[u8]) -> Result<ActorRecord, StorageError> {
        bincode::deserialize(raw)
            .map_err(|e| StorageError::data(format!("Failed to deserialize actor record: {}", e)))
    }
}

impl ActorStore for SledActorStore {
    fn get(&self, actor_id: &str) -> Result<Option<ActorRecord>, StorageError> {
        match self
            .actors
            .get(actor_id.as_bytes())
            .map_err(|e| StorageError::io(format!("Failed to get actor record: {}", e)))?
        {
            Some(value) => Ok(Some(Self::decode(&value)?)),
            None => Ok(None),
        }
    }

    fn upsert(&self, record: &ActorRecord) -> Result<(), StorageError> {
        let value = Self::encode(record)?;
        let _write = self.write_lock.lock();
        self.actors
            .insert(record.id.as_bytes(), value)
            .map_err(|e| StorageError::io(format!("Failed to put actor record: {}", e)))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<ActorRecord>, StorageError> {
        let mut out = Vec::new();
        for result in self.actors.iter() {
            let (_, value) = result.map_err(StorageError::io)?;
            out.push(Self::decode(&value)?);
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    fn update(
        &self,
        actor_id: &str,
        apply: &mut dyn FnMut(&mut ActorRecord),
    ) -> Result<Option<ActorRecord>, StorageError> {
        let _write = self.write_lock.lock();
        let Some(raw) = self.actors.get(actor_id.as_bytes()).map_err(StorageError::io)? else {
            return Ok(None);
        };
        let mut record = Self::decode(&raw)?;
        apply(&mut record);
        self.actors
            .insert(actor_id.as_bytes(), Self::encode(&record)?)
            .map_err(|e| StorageError::io(format!("Failed to update actor record: {}", e)))?;
        Ok(Some(record))
    }
}
