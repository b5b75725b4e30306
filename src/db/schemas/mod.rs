//! MongoDB document schemas for works, reviews and profiles

mod metadata;
mod profile;
mod review;
mod work;

pub use metadata::Metadata;
pub use profile::{AuthorDoc, ValidatorDoc};
pub use review::WorkReviewDoc;
pub use work::WorkDoc;
