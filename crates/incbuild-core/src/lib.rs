//! Incremental build staleness detection
//!
//! Decides, module by module, whether the outputs of a multi-module build are
//! stale with respect to the module descriptor, its dependencies, its
//! resources and its sources, and removes the outputs of stale modules so
//! they are rebuilt from scratch. Enough state is kept under each module's
//! build directory to make the decision incrementally on the next run.

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod registry;
pub mod scan;
pub mod staleness;
pub mod state;

pub use config::{BuildPlan, CliOverrides, ConfigError, EngineConfig, ModuleSpec, ResourceGroup};
pub use engine::{Evaluation, Skipped, StalenessEngine};
pub use error::{EngineError, Result};
pub use identity::ModuleIdentifier;
pub use registry::{Module, ModuleRegistry, RegistryError};
pub use staleness::{StaleReason, Verdict};
pub use state::{ResourceSetStore, StoreError, TimestampStore};
