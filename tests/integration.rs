//! Integration tests for regionscope.

mod common;

#[path = "integration/discovery_cycle_test.rs"]
mod discovery_cycle_test;

#[path = "integration/inventory_test.rs"]
mod inventory_test;
