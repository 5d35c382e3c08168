//! Script job orchestration.
//!
//! The [`coordinator::JobCoordinator`] ties the `core` workspace, invoker and
//! prober together for a single request.

pub mod coordinator;
