//! Command handlers: wire adapters to the application services.

pub mod list;
pub mod validate;
