//! Active transport registry: which transport is currently acting as
//! client, and which as server.
//!
//! The registry is a lookup, not a controller — it never starts or stops
//! the transports it holds. It is written exactly once per role during
//! application configuration (single-writer-at-startup discipline) and read
//! thereafter by the framework to route calls. The two slots may hold the
//! same instance or different instances.
//!
//! This is the explicit-object replacement for a pair of process-wide
//! static pointers: construct one registry, hand it to the components that
//! need it.

use std::sync::{Arc, OnceLock};

use crate::{
    error::RegistryError,
    transport::{ClientTransport, ServerTransport},
};

/// Holder of the currently selected client-role and server-role transports.
#[derive(Default)]
pub struct TransportRegistry {
    client: OnceLock<Arc<dyn ClientTransport>>,
    server: OnceLock<Arc<dyn ServerTransport>>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the client-role transport.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadySet`] if a client transport was
    /// already selected; the slot is write-once.
    pub fn set_client(&self, transport: Arc<dyn ClientTransport>) -> Result<(), RegistryError> {
        self.client
            .set(transport)
            .map_err(|_| RegistryError::AlreadySet { role: "client" })
    }

    /// Select the server-role transport.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadySet`] if a server transport was
    /// already selected.
    pub fn set_server(&self, transport: Arc<dyn ServerTransport>) -> Result<(), RegistryError> {
        self.server
            .set(transport)
            .map_err(|_| RegistryError::AlreadySet { role: "server" })
    }

    /// The transport currently acting as client, if one was selected.
    #[must_use]
    pub fn client(&self) -> Option<&Arc<dyn ClientTransport>> {
        self.client.get()
    }

    /// The transport currently acting as server, if one was selected.
    #[must_use]
    pub fn server(&self) -> Option<&Arc<dyn ServerTransport>> {
        self.server.get()
    }
}
