// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the filaq queue coordination engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and typed query
//! modules for tickets, per-day counters, shop settings, the service
//! catalog, and push subscriptions.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{Database, SchemaReport};
pub use models::*;
