mod client;
mod config;
mod schema;
mod telemetry_repository;

pub use client::*;
pub use config::*;
pub use schema::*;
pub use telemetry_repository::*;
