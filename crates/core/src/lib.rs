//! Storekeep Core - Shared domain types.
//!
//! This crate provides the types every Storekeep component agrees on:
//! - `api` - HTTP service and order/session workflows
//! - `cli` - Command-line tools for migrations, seeding and admin accounts
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. The `postgres` feature adds `sqlx` encoding so the same
//! types can be bound directly in queries.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, emails, money, and the order status machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
