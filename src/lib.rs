//! Palaver is a terminal chat client for a remote, tool-using answering service.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] speaks the service's HTTP contract and normalizes every response
//!   into the domain model; [`api::AnsweringBackend`] is the seam tests fake.
//! - [`core`] owns the domain types, the persisted conversation store, the
//!   session controller state machine and configuration.
//! - [`ui`] turns assistant text into HTML blocks with citations and presents
//!   thinking steps.
//! - [`commands`] implements the chat REPL's slash commands.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
