//! Schema translation between the client-facing and upstream shapes.
//!
//! All functions here are pure: no I/O, no config lookups.

pub mod request;
pub mod response;
pub mod types;
