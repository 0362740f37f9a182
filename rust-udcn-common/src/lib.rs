//! Common types and utilities for the micro Data-Centric Networking (μDCN) implementation.
//!
//! This crate provides the NDN packet model, TLV codec, error type and metric
//! primitives shared by the PIT-CS composite table and its command-line tools.

pub mod ndn;
pub mod tlv;
pub mod metrics;
pub mod types;
pub mod error;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
