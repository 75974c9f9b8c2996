//! Unit tests for rdsvalidator
//!
//! These tests use in-memory fakes and run fast without cloud access.

mod inventory;
mod ledger;
mod orchestrator;
mod poller;
