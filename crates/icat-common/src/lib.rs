//! iCAT Common - Shared types and utilities
//!
//! This crate provides the error model, shared enumerations, checksum
//! helpers and connection configuration used across the iCAT client
//! crates.

pub mod checksum;
pub mod config;
pub mod error;
pub mod types;

pub use config::{ConnectionOptions, CredentialSource, EnvironmentFile};
pub use error::{Error, ErrorKind, Level, Result};
pub use types::*;
