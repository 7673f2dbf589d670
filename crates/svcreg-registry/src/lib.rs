//! # svcreg Registry
//!
//! Distributed service registry layered on a DHT.
//!
//! This crate provides:
//! - The address codec packing multi-protocol endpoints into DHT values
//! - The registration engine (register / unregister / discover)
//! - The liveness engine that probes endpoints and evicts dead ones
//! - The DHT facade with in-memory and remote implementations
//! - HTTP API, server and the `svcreg` executable

pub mod api;
pub mod codec;
pub mod config;
pub mod dht;
pub mod health_cache;
pub mod liveness;
pub mod registry;
pub mod server;
pub mod types;

// Re-export commonly used items
pub use config::RegistryConfig;
pub use liveness::{LivenessEngine, SweepReport, SweepStats};
pub use registry::{RegisterOutcome, Registry, UnregisterOutcome};
pub use server::RegistryServer;
