//! Clients for the external HTTP collaborators.

pub mod email;
