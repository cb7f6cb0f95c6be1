//! Common helpers for integration tests.
//!
//! # Modules
//!
//! - `logger`: Structured test logging
//! - `upstream`: A mocked PBX API and a service wired against it

pub mod logger;
pub mod upstream;
