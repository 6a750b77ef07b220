//! Test utilities shared by unit and route tests.
//!
//! This module provides:
//! - An in-memory transactional license store
//! - In-memory chat collaborators (known users, recording transport)
//! - Factories for key records
//! - A builder for an `AppState` wired to the in-memory store

mod app_state_builder;
mod chat_mocks;
mod factories;
mod license_mocks;

pub use app_state_builder::*;
pub use chat_mocks::*;
pub use factories::*;
pub use license_mocks::*;
