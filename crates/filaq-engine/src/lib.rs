// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue coordination engine.
//!
//! Orchestrates the storage transactions, the state machine, the grace
//! admission control, the fanout hub, and the notifier behind one typed
//! API. Every mutation commits first, then pushes fresh snapshots to the
//! affected channels inline; snapshot failures are logged and never fail
//! the operation that caused them.

pub mod engine;
pub mod sweep;

pub use engine::{JoinRequest, QueueEngine};
pub use sweep::spawn_sweeper;
