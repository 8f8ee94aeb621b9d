//! Ticket guard providers.
//!
//! Traits for the collaborators the analyzers consult. The analyzers and
//! the request lifecycle depend on these traits; concrete backends live in
//! [`crate::stores`].

pub mod ticket_store;

pub use ticket_store::TicketStore;
