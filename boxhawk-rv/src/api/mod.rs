//! HTTP API handlers for boxhawk-rv

pub mod auth;
pub mod blobs;
pub mod error;
pub mod health;
pub mod images;
pub mod session;
pub mod submissions;

pub use auth::{Caller, PRINCIPAL_HEADER, ROLE_HEADER};
pub use blobs::put_blob;
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use images::{delete_images, image_history, move_to_existing, move_to_new};
pub use session::{check_access, get_session};
pub use submissions::{
    complete_submission, create_submission, get_submission, list_submissions, reject_submission,
    reopen_submission, start_review, upload_images,
};
