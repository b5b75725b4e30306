//! Library domain
//!
//! Records, the work state machine, the access policy and the store seams.
//! Everything here is free of I/O except the store traits themselves.

pub mod access;
pub mod clock;
pub mod participant;
pub mod purchase;
pub mod review;
pub mod store;
pub mod work;

pub use access::{visibility, Visibility};
pub use clock::{Clock, ManualClock, SystemClock};
pub use participant::{
    is_web3_address, normalize_address, AuthorInfo, AuthorProfile, Participant, ProfileFields,
    Registration, ValidatorInfo, ValidatorProfile,
};
pub use purchase::{
    default_purchase_window, has_valid_grant, Bookmark, PurchaseGrant,
    DEFAULT_PURCHASE_WINDOW_HOURS,
};
pub use review::{
    QuestionId, Questionnaire, ReviewBody, ReviewDraft, ReviewLink, ReviewQuorum, ReviewStatus,
    Score, WorkReview,
};
pub use store::{
    IdentityStore, LinkageStore, ProfileStore, ReviewDocumentStore, Stores, WorkDocumentStore,
};
pub use work::{
    parse_keywords, InitialWorkStatus, NewWork, TransitionPlan, Work, WorkContent, WorkLink,
    WorkStatus, WorkTransition, DEFAULT_WORK_PRICE,
};

/// Fresh record id (UUID v4)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
