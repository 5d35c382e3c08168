//! Domain logic for running OpenSees scripts.
//!
//! Everything here is HTTP-agnostic: workspace provisioning, subprocess
//! supervision, engine probing and the per-job state machine. The `api`
//! crate wires these into request handlers.

pub mod error;
pub mod scripting;
