//! Storage synchronization engine.
//!
//! Mirrors the persistent storage of a source-chain contract onto a
//! target-chain proxy: full key discovery, three differential strategies,
//! EIP-1186 proof assembly with local verification, runtime-bytecode
//! cloning, and the migration coordinator that drives the relay and proxy
//! contracts.

pub mod cloner;
pub mod config;
pub mod diff;
pub mod enumerator;
pub mod errors;
pub mod migrator;
pub mod proof;

pub use config::EngineConfig;
pub use diff::{Diff, DiffEngine, SlotDiff, StrategyKind};
pub use errors::EngineError;
pub use migrator::{EngineState, MigrationReport, SyncEngine, SyncOutcome};
