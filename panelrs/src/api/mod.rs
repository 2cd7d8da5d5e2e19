//! Public API module.
//!
//! This module contains the user-facing types of the `panelrs` crate: the
//! [`DevicePanel`](panel::DevicePanel) façade, its configuration and the
//! records and outcomes it delivers.

pub mod config;
pub mod models;
pub mod panel;
