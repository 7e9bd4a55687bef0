//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use tracing::info;

use crate::group::LmdbGroupStore;
use crate::invite::LmdbInviteStore;
use crate::LmdbError;

/// Number of named databases the environment must be able to hold.
pub const MAX_DBS: u32 = 4;

/// Default map size (1 GiB).
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    groups_db: Database<Str, Bytes>,
    invites_db: Database<Str, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per process for this path and
        // the memory map is never touched outside of heed.
        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(max_dbs.max(MAX_DBS))
                .map_size(map_size)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let groups_db = env.create_database(&mut wtxn, Some("groups"))?;
        let invites_db = env.create_database(&mut wtxn, Some("invites"))?;
        wtxn.commit()?;

        info!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(Self {
            env: Arc::new(env),
            groups_db,
            invites_db,
        })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn group_store(&self) -> LmdbGroupStore {
        LmdbGroupStore {
            env: Arc::clone(&self.env),
            groups_db: self.groups_db,
        }
    }

    pub fn invite_store(&self) -> LmdbInviteStore {
        LmdbInviteStore {
            env: Arc::clone(&self.env),
            invites_db: self.invites_db,
        }
    }

    /// Flush the memory map to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}
