//! Bundle of port implementations injected into the service.

use std::sync::Arc;

use crate::ports::{AuthPort, BinStore, TeamStore};

#[derive(Debug, Clone)]
/// Static metadata describing a backend implementation.
pub struct BackendMeta {
    /// Short machine identifier, e.g. "memory" or "remote".
    pub id: String,
    /// Human-friendly name for logs and the console status line.
    pub name: String,
}

/// Collection of ports implementing one storage/auth backend.
///
/// Exactly one backend is live per process; it is assembled at startup and
/// handed to the service, never reached through shared module state.
pub struct Backend {
    /// Static metadata describing the backend.
    pub meta: BackendMeta,
    /// Implementation for the bin collection.
    pub bins: Arc<dyn BinStore>,
    /// Implementation for the team roster.
    pub team: Arc<dyn TeamStore>,
    /// Implementation for authentication.
    pub auth: Arc<dyn AuthPort>,
}
