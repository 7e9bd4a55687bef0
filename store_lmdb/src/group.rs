//! LMDB implementation of GroupStore.
//!
//! Records are keyed by group name and encoded with bincode. LMDB keeps keys
//! sorted, so a full scan returns groups ordered by name.

use std::sync::Arc;

use heed::types::{Bytes, Str};
use heed::{Database, Env};

use cohort_store::{GroupRecord, GroupStore, StoreError};

use crate::LmdbError;

pub struct LmdbGroupStore {
    pub(crate) env: Arc<Env>,
    pub(crate) groups_db: Database<Str, Bytes>,
}

fn decode(bytes: &[u8]) -> Result<GroupRecord, LmdbError> {
    Ok(bincode::deserialize(bytes)?)
}

fn encode(record: &GroupRecord) -> Result<Vec<u8>, LmdbError> {
    Ok(bincode::serialize(record)?)
}

impl GroupStore for LmdbGroupStore {
    fn find(&self) -> Result<Vec<GroupRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut records = Vec::new();
        for entry in self.groups_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_name, bytes) = entry.map_err(LmdbError::from)?;
            records.push(decode(bytes)?);
        }
        Ok(records)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<GroupRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let record = self
            .groups_db
            .get(&rtxn, name)
            .map_err(LmdbError::from)?
            .map(decode)
            .transpose()?;
        Ok(record)
    }

    fn create(&self, record: GroupRecord) -> Result<GroupRecord, StoreError> {
        let bytes = encode(&record)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .groups_db
            .get(&wtxn, &record.name)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(record.name));
        }
        self.groups_db
            .put(&mut wtxn, &record.name, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(record)
    }

    fn save(&self, record: &GroupRecord) -> Result<GroupRecord, StoreError> {
        let bytes = encode(record)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .groups_db
            .get(&wtxn, &record.name)
            .map_err(LmdbError::from)?
            .is_none()
        {
            return Err(StoreError::NotFound(record.name.clone()));
        }
        self.groups_db
            .put(&mut wtxn, &record.name, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(record.clone())
    }

    fn group_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.groups_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
