//! Storage implementations for shadow records.
//!
//! - **Memory** - Sharded concurrent map with read-time expiry
//!
//! Backends are selected by [`TicketStoreKind`] in configuration.

pub mod memory;

pub use memory::MemoryTicketStore;

use crate::config::TicketStoreKind;
use crate::environment::Clock;
use crate::providers::TicketStore;
use std::sync::Arc;

impl TicketStoreKind {
    /// Construct the configured backend.
    #[must_use]
    pub fn build(self, clock: Arc<dyn Clock>) -> Arc<dyn TicketStore> {
        match self {
            Self::Memory => Arc::new(MemoryTicketStore::new(clock)),
        }
    }
}
