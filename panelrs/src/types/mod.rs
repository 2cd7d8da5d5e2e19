//! Type definitions and constants.
//!
//! This module contains bus names, tool arguments and default values.

pub(crate) mod constants;
