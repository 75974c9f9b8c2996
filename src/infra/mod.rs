//! Infrastructure layer: adapters behind the application ports.
//!
//! All process execution and filesystem access lives here. Imports from
//! `crate::commands` or `crate::output` are forbidden.

pub mod aws;
pub mod command_runner;
pub mod config;
pub mod gate;
pub mod scripts;
pub mod signal;
pub mod tunnel;
