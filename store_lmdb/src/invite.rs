//! LMDB implementation of InviteStore.

use std::sync::Arc;

use heed::types::{Bytes, Str};
use heed::{Database, Env};
use tracing::debug;

use cohort_store::{check_redeemable, InviteRecord, InviteStore, StoreError};

use crate::LmdbError;

pub struct LmdbInviteStore {
    pub(crate) env: Arc<Env>,
    pub(crate) invites_db: Database<Str, Bytes>,
}

fn decode(bytes: &[u8]) -> Result<InviteRecord, LmdbError> {
    Ok(bincode::deserialize(bytes)?)
}

impl InviteStore for LmdbInviteStore {
    fn put_invite(&self, invite: &InviteRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(invite).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.invites_db
            .put(&mut wtxn, &invite.code, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_invite(&self, code: &str) -> Result<Option<InviteRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let invite = self
            .invites_db
            .get(&rtxn, code)
            .map_err(LmdbError::from)?
            .map(decode)
            .transpose()?;
        Ok(invite)
    }

    fn redeem_invite(&self, code: &str, group_name: &str) -> Result<InviteRecord, StoreError> {
        // Read, check and mark inside one write transaction so a code can
        // never be consumed twice.
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut invite = match self.invites_db.get(&wtxn, code).map_err(LmdbError::from)? {
            Some(bytes) => decode(bytes)?,
            None => return Err(StoreError::NotFound(format!("invite code '{code}'"))),
        };
        check_redeemable(&invite, group_name)?;
        invite.redeemed = true;
        let bytes = bincode::serialize(&invite).map_err(LmdbError::from)?;
        self.invites_db
            .put(&mut wtxn, code, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        debug!(group = group_name, "invite redeemed");
        Ok(invite)
    }
}
