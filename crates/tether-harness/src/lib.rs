//! Deterministic in-process harness for the tether transport contracts.
//!
//! This crate provides [`MemoryTransport`]-family implementations of the
//! capability traits: a linked client/server pair that moves packets
//! through shared memory with no sockets, no threads, and no timing
//! dependence. Integration tests drive the pair through the real
//! [`tether_core::lifecycle`] machinery and observe exactly what a concrete
//! transport's subscribers would observe.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod memory;

pub use memory::{MemoryClient, MemoryConfig, MemoryServer, MemoryTransport};
