//! Core types and service wiring for the binwatch bin monitoring console.

/// Bundle of port implementations injected into the service.
pub mod backend;
/// Domain models and identifiers shared by all backends.
pub mod model;
/// Traits describing the backend interfaces and the error taxonomy.
pub mod ports;
/// High-level service facade used by clients.
pub mod service;
/// Scoped subscription resource over the change channel.
pub mod subscription;

pub use backend::*;
pub use model::*;
pub use ports::*;
pub use service::*;
pub use subscription::*;
