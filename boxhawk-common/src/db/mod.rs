//! Database schema, migrations and row models

pub mod init;
pub mod migrations;
pub mod models;

pub use init::*;
pub use migrations::{backfill_legacy_image_slots, run_migrations};
pub use models::*;
