//! Review engine services
//!
//! Each service takes the caller as an explicit [`Principal`] and checks the
//! role table before touching the database.
//!
//! [`Principal`]: boxhawk_common::Principal

pub mod image_registry;
pub mod listing;
pub mod reassignment;
pub mod review;

pub use image_registry::{replay, ImageRegistry, ReplayedImage};
pub use listing::{ImageView, ListRequest, ListResponse, Listing, SubmissionView};
pub use reassignment::{MoveToExistingOutcome, MoveToNewOutcome, Reassignment};
pub use review::{transition_allowed, ReviewWorkflow, TransitionOutcome};
