//! # BoxHawk Common Library
//!
//! Shared code for the BoxHawk review services:
//! - Error taxonomy
//! - Database schema, migrations and row models
//! - Role authorization table
//! - Packaging symbol sets and their storage codec
//! - Object store path validation
//! - Configuration loading
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod roles;
pub mod storage_path;
pub mod symbols;
pub mod time;

pub use error::{Error, Result};
pub use roles::{Principal, Role};
