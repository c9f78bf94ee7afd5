//! Routing module
//!
//! Longest-prefix route selection over the static route table.

pub mod matcher;

pub use matcher::match_route;
