use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("group error: {0}")]
    Group(#[from] cohort_groups::GroupError),

    #[error("store error: {0}")]
    Store(#[from] cohort_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] cohort_store_lmdb::LmdbError),

    #[error("ledger client error: {0}")]
    Ledger(#[from] cohort_groups::LedgerError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RPC server error: {0}")]
    Rpc(String),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
