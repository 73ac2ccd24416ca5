//! `warden-core` — identifiers and error primitives shared by the engine and
//! its adapters.
//!
//! This crate contains no policy logic and no infrastructure concerns.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{DepartmentId, TeamId, UserId};
