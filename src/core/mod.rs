pub mod config;
pub mod error;
pub mod health;
pub mod message;
pub mod session;
pub mod store;
