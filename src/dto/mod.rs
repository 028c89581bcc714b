pub mod auth;
pub mod cart;
pub mod orders;
pub mod payments;
pub mod products;
pub mod service_requests;
pub mod services;
pub mod users;
