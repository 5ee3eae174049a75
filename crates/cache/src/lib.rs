#![warn(clippy::unwrap_used)]

pub mod client;
pub mod local;

pub use client::CachedWarehouse;
pub use local::QueryCache;
