//! Domain layer - Records and port definitions
//!
//! This module defines the persisted records and the core traits (ports)
//! that driver adapters implement, following hexagonal architecture
//! principles.

pub mod model;
pub mod ports;

pub use model::*;
pub use ports::*;
