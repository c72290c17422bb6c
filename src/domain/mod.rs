//! Domain modules organized as vertical slices.
//!
//! Each sub-module contains:
//! - `mod.rs`: Domain types
//! - `wire.rs`: Raw serde structs matching what the device sends
//! - `convert.rs`: Wire → domain conversions
//! - `state.rs`: State containers with update methods (for WS-driven data)
//! - `client.rs`: Sub-client with HTTP methods

pub mod device;
pub mod log;
