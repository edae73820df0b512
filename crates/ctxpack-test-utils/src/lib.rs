#![deny(unsafe_code)]

//! Shared test utilities for the ctxpack workspace.
//!
//! Provides temporary fixture repositories, config builders, and tracing
//! helpers so that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! ctxpack-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fixture;
pub mod tracing_setup;

pub use config::TestConfigBuilder;
pub use fixture::TestRepo;
