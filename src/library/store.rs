//! Persistence seams
//!
//! The document side (MongoDB) holds work content, reviews and profiles.
//! The relational side (PostgreSQL) holds participants, the work and review
//! linkage rows, purchase grants and bookmarks. Nothing is atomic across the
//! two; the services above compensate on reads.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::participant::{AuthorProfile, Participant, ValidatorProfile};
use super::purchase::{Bookmark, PurchaseGrant};
use super::review::{ReviewLink, ReviewStatus, WorkReview};
use super::work::{Work, WorkLink, WorkStatus};
use crate::auth::ParticipantRole;
use crate::types::Result;

/// Participants and their roles
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a participant. Conflict when nickname or address is taken.
    async fn create_participant(&self, participant: Participant) -> Result<Participant>;

    async fn participant_by_address(&self, address: &str) -> Result<Option<Participant>>;

    async fn participant_by_id(&self, id: &str) -> Result<Option<Participant>>;

    /// Raise the role to at least `role`, never lowering it. Returns the
    /// role stored afterwards.
    async fn update_role(&self, id: &str, role: ParticipantRole) -> Result<ParticipantRole>;

    async fn update_nickname(&self, id: &str, nickname: &str) -> Result<()>;
}

/// Author and validator profiles, keyed by participant id
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn author(&self, participant_id: &str) -> Result<Option<AuthorProfile>>;

    /// Insert or replace
    async fn put_author(&self, profile: &AuthorProfile) -> Result<()>;

    async fn validator(&self, participant_id: &str) -> Result<Option<ValidatorProfile>>;

    /// Insert or replace
    async fn put_validator(&self, profile: &ValidatorProfile) -> Result<()>;
}

/// Work documents
#[async_trait::async_trait]
pub trait WorkDocumentStore: Send + Sync {
    async fn put_work(&self, work: &Work) -> Result<()>;

    /// Works among `ids` that exist; order is unspecified
    async fn works_by_ids(&self, ids: &[String]) -> Result<Vec<Work>>;

    /// Case-insensitive match over name and annotation, OR across keywords,
    /// each work at most once
    async fn works_by_keywords(&self, keywords: &[String]) -> Result<Vec<Work>>;

    async fn set_work_status(&self, id: &str, status: WorkStatus) -> Result<()>;

    /// Returns whether a document was removed
    async fn delete_work(&self, id: &str) -> Result<bool>;
}

/// Review documents
#[async_trait::async_trait]
pub trait ReviewDocumentStore: Send + Sync {
    async fn review(&self, id: &str) -> Result<Option<WorkReview>>;

    /// Insert or replace by id
    async fn put_review(&self, review: &WorkReview) -> Result<()>;
}

/// Relational rows keyed by participant and work ids
#[async_trait::async_trait]
pub trait LinkageStore: Send + Sync {
    // Work linkage

    async fn create_work_link(&self, link: &WorkLink) -> Result<()>;

    async fn work_link(&self, work_id: &str) -> Result<Option<WorkLink>>;

    async fn work_links(&self) -> Result<Vec<WorkLink>>;

    async fn work_links_by_author(&self, participant_id: &str) -> Result<Vec<WorkLink>>;

    async fn work_links_by_status(&self, status: WorkStatus) -> Result<Vec<WorkLink>>;

    /// Set `next` only if the row is still at `expected`. Returns whether a
    /// row changed.
    async fn transition_work_status(
        &self,
        work_id: &str,
        expected: WorkStatus,
        next: WorkStatus,
    ) -> Result<bool>;

    async fn delete_work_link(&self, work_id: &str) -> Result<bool>;

    // Review linkage

    async fn review_link(&self, participant_id: &str, work_id: &str)
        -> Result<Option<ReviewLink>>;

    /// Insert `link` unless a row for the same (participant, work) exists;
    /// returns the row that is stored afterwards
    async fn ensure_review_link(&self, link: ReviewLink) -> Result<ReviewLink>;

    async fn review_links(&self, work_id: &str) -> Result<Vec<ReviewLink>>;

    async fn set_review_status(
        &self,
        id: &str,
        status: ReviewStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    // Purchase grants

    async fn create_grant(&self, grant: &PurchaseGrant) -> Result<()>;

    async fn grants(&self, participant_id: &str, work_id: &str) -> Result<Vec<PurchaseGrant>>;

    async fn grants_by_participant(&self, participant_id: &str) -> Result<Vec<PurchaseGrant>>;

    /// Remove every grant for a work; returns the number removed
    async fn delete_grants(&self, work_id: &str) -> Result<u64>;

    // Bookmarks

    /// Returns false when the bookmark already existed
    async fn create_bookmark(&self, bookmark: &Bookmark) -> Result<bool>;

    async fn has_bookmark(&self, participant_id: &str, work_id: &str) -> Result<bool>;

    async fn bookmarked_work_ids(&self, participant_id: &str) -> Result<Vec<String>>;

    async fn delete_bookmark(&self, participant_id: &str, work_id: &str) -> Result<bool>;

    /// Remove every bookmark for a work; returns the number removed
    async fn delete_bookmarks(&self, work_id: &str) -> Result<u64>;
}

/// Every store the services need
#[derive(Clone)]
pub struct Stores {
    pub identity: Arc<dyn IdentityStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub works: Arc<dyn WorkDocumentStore>,
    pub reviews: Arc<dyn ReviewDocumentStore>,
    pub linkage: Arc<dyn LinkageStore>,
}
