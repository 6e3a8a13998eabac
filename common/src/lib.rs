//! Shared building blocks for the query and app services.

pub mod config;
pub mod errors;
pub mod events;
pub mod middleware;
pub mod models;
pub mod response;
pub mod store;
pub mod utils;
