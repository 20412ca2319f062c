pub mod config;
pub mod error;
pub mod fsops;
pub mod layout;
pub mod state_machine;
pub mod store;
pub mod types;

pub use config::OrchestratorConfig;
pub use error::{Result, VaultError};
pub use layout::{Stage, VaultLayout};
pub use store::{FsStageStore, StageStore};
pub use types::*;
