//! LMDB storage backend for cohort membership groups.
//!
//! Implements the storage traits from `cohort-store` using the `heed` LMDB
//! bindings. Each logical store maps to one LMDB database within a single
//! environment.

pub mod environment;
pub mod error;
pub mod group;
pub mod invite;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use group::LmdbGroupStore;
pub use invite::LmdbInviteStore;
