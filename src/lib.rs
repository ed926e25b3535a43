pub mod api;
pub mod bookings;
pub mod cart;
pub mod checkout;
pub mod core;
pub mod events;
pub mod location;
pub mod models;
pub mod order_number;
pub mod receipt;
pub mod routes;
pub mod schema;
pub mod session;
pub mod status;
pub mod store;
pub mod terminal;

#[cfg(test)]
pub(crate) mod fixtures;
