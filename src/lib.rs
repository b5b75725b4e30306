//! Scriptorium - digital library backend
//!
//! Authors publish works, validators review them, readers buy time-limited
//! access to their content. Payments and roles are mirrored on an external
//! ledger; everything else lives in a document store and a relational store.
//!
//! ## Layout
//!
//! - **library**: domain types, the work lifecycle, the access policy and the store traits
//! - **services**: identity, works, reviews and purchases over the stores and the ledger
//! - **ledger**: the ledger gateway trait with HTTP and in-memory implementations
//! - **db**: MongoDB, PostgreSQL and in-memory store implementations
//! - **auth**: bearer tokens and the route role table
//! - **routes** / **server**: the HTTP surface

pub mod auth;
pub mod config;
pub mod db;
pub mod ledger;
pub mod library;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{LibraryError, Result};
