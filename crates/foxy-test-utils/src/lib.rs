//! Shared test utilities for the foxy workspace.
//!
//! This crate provides fixtures reused by the crate test suites. It is a
//! dev-dependency only and never published.
//!
//! # Modules
//!
//! - [`project`]: [`TestProject`] builder for a Composer project on disk
//! - [`executor`]: [`MockExecutor`], a scripted process executor
//! - [`host`]: [`MockHost`], an in-memory host

pub mod executor;
pub mod host;
pub mod project;

pub use executor::{Call, MockExecutor};
pub use host::MockHost;
pub use project::TestProject;
