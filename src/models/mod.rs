//! Data models shared by the forecast and drive-time services
//!
//! - Location: Geographic coordinates and cache key helpers

pub mod location;

pub use location::Coordinates;
