//! OpenSees script execution domain logic.
//!
//! Provides the workspace manager, the engine invoker, the health prober and
//! the per-job state machine. All subprocess management is pure (no HTTP)
//! and lives in the `core` crate for isolation and testability.

pub mod engine;
pub mod executor;
pub mod health;
pub mod status;
pub mod subprocess;
pub mod workspace;
