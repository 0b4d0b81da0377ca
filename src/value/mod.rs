//! Value handling for Tidepool
//!
//! Columns are stored as `sea_query::Value`. This module provides what the
//! record layer needs on top of that:
//!
//! - **`compare`** - loose equality and the hashable [`KeyValue`] used to group
//!   related rows and diff columns
//! - **`json`** - JSON projection, including non-finite floats
//! - **`cast`** - declared per-column representation ([`Cast`])

pub mod cast;
pub mod compare;
pub mod json;

pub use cast::Cast;
pub use compare::{as_i64, is_null, loose_eq, normalize, KeyValue};
pub use json::{from_json, to_json};
