//! Application services: the provisioning use cases.
//!
//! Services compose domain logic with port calls and import only from
//! `crate::domain` and `crate::application`.

pub mod acquire;
pub mod inventory;
pub mod provision;
pub mod release;
