//! The `services` module provides a high-level API for interacting with the database.
//! It encapsulates the query logic and data access patterns, allowing the rest of
//! the application (HTTP handlers, the container service) to work with domain models
//! without needing to know about the underlying schema.
//!
//! Containers are reached through the [`ContainerStore`] trait so that the
//! reconciliation and control logic can run against any backing store. Users,
//! servers and refresh tokens are plain functions over a `DatabaseConnection`.

pub mod container_store;
pub mod refresh_token_service;
pub mod server_service;
pub mod user_service;

pub use container_store::*;
pub use refresh_token_service::*;
pub use server_service::*;
pub use user_service::*;
