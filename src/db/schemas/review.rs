//! Work review document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::LibraryDocument;
use crate::db::schemas::Metadata;
use crate::library::{ReviewBody, ReviewStatus, WorkReview};

/// Collection name for work reviews
pub const WORK_REVIEW_COLLECTION: &str = "work_reviews";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WorkReviewDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Same id as the review linkage row
    pub id: String,

    pub work_id: String,

    #[serde(default)]
    pub body: ReviewBody,

    pub status: ReviewStatus,

    #[serde(default)]
    pub language: String,
}

impl From<&WorkReview> for WorkReviewDoc {
    fn from(review: &WorkReview) -> Self {
        Self {
            _id: None,
            metadata: Metadata::at(review.created_at, review.updated_at),
            id: review.id.clone(),
            work_id: review.work_id.clone(),
            body: review.body.clone(),
            status: review.status,
            language: review.language.clone(),
        }
    }
}

impl From<WorkReviewDoc> for WorkReview {
    fn from(doc: WorkReviewDoc) -> Self {
        Self {
            created_at: doc.metadata.created(),
            updated_at: doc.metadata.updated(),
            id: doc.id,
            work_id: doc.work_id,
            body: doc.body,
            status: doc.status,
            language: doc.language,
        }
    }
}

impl LibraryDocument for WorkReviewDoc {
    const COLLECTION: &'static str = WORK_REVIEW_COLLECTION;

    fn indexes() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("review_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "work_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("review_work_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
