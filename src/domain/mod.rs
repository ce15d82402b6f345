//! Domain modules organized as vertical slices.
//!
//! Each sub-module contains some of:
//! - `mod.rs`: Rich domain types (validated, business-logic-ready)
//! - `wire.rs`: Raw serde structs matching venue frames and responses
//! - `convert.rs`: Conversions from wire to domain with validation
//! - `state.rs`: State containers with update methods (for WS-driven data)
//! - `client.rs`: Sub-client with HTTP methods and caching

pub mod history;
pub mod quote;
pub mod series;
pub mod view;
