//! Infrastructure layer: storage, configuration and the ledger workflows.
//!
//! The domain crates stay IO-free; everything that touches a database, a clock
//! or a timeout lives here.

pub mod config;
pub mod store;
pub mod workflows;

pub use config::AppConfig;
pub use store::{LedgerStore, LedgerTx, StoreError};
pub use workflows::WorkflowError;
