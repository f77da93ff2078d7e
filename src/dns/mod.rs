//! DNS Protocol Support
//!
//! This module provides the DNS-facing half of the mirror: reading a full
//! zone out of an authoritative master and holding it as an in-memory
//! snapshot.
//!
//! # Module Structure
//!
//! * `protocol` - DNS protocol definitions and packet handling
//! * `buffer` - Low-level packet buffer operations
//! * `zone` - In-memory zone snapshots and record sets
//! * `client` - AXFR transfer client and master liveness probing
//! * `netutil` - Internal network utilities

/// Low-level buffer operations for DNS packet handling
pub mod buffer;

/// AXFR transfer client and master server probing
pub mod client;

/// Internal network utilities
mod netutil;

/// DNS protocol definitions and packet structures
pub mod protocol;

/// In-memory zone snapshots assembled from transfers and provider listings
pub mod zone;
