//! Core device-management logic.
//!
//! Resolution, cataloging, operation execution and background scheduling.
//! Everything here is reached through [`Scheduler`](scheduler::Scheduler)
//! and the [`DevicePanel`](crate::DevicePanel) built on top of it.

pub(crate) mod catalog;
pub(crate) mod delivery;
pub(crate) mod executor;
pub(crate) mod resolver;
pub(crate) mod scheduler;
pub(crate) mod state_cache;
pub(crate) mod tokens;
