//! Core types for paperdb: chunk identity, capability traits, the error
//! taxonomy, chunking and layered configuration.
//!
//! Every other crate in the workspace depends on this one and talks to the
//! outside world only through the traits in [`traits`].

pub mod chunker;
pub mod config;
pub mod error;
pub mod identity;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
