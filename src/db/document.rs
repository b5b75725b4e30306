//! Document side of the library on MongoDB

use bson::doc;
use std::collections::HashSet;
use tracing::debug;

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{AuthorDoc, ValidatorDoc, WorkDoc, WorkReviewDoc};
use crate::library::{
    AuthorProfile, ProfileStore, ReviewDocumentStore, ValidatorProfile, Work, WorkDocumentStore,
    WorkReview, WorkStatus,
};
use crate::types::Result;

/// Works, reviews and profiles in MongoDB
#[derive(Clone)]
pub struct MongoDocumentStore {
    works: MongoCollection<WorkDoc>,
    reviews: MongoCollection<WorkReviewDoc>,
    authors: MongoCollection<AuthorDoc>,
    validators: MongoCollection<ValidatorDoc>,
}

impl MongoDocumentStore {
    /// Open the collections, creating their indexes
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            works: client.collection().await?,
            reviews: client.collection().await?,
            authors: client.collection().await?,
            validators: client.collection().await?,
        })
    }
}

#[async_trait::async_trait]
impl WorkDocumentStore for MongoDocumentStore {
    async fn put_work(&self, work: &Work) -> Result<()> {
        self.works
            .upsert_one(doc! { "id": work.id.as_str() }, WorkDoc::from(work))
            .await
    }

    async fn works_by_ids(&self, ids: &[String]) -> Result<Vec<Work>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let docs = self.works.find_many(doc! { "id": { "$in": ids.to_vec() } }).await?;
        Ok(docs.into_iter().map(Work::from).collect())
    }

    async fn works_by_keywords(&self, keywords: &[String]) -> Result<Vec<Work>> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        // One phrase query per keyword; a work matching several is kept once
        for keyword in keywords {
            let phrase = format!("\"{}\"", keyword.replace('"', ""));
            let docs = self
                .works
                .find_many(doc! { "$text": { "$search": phrase } })
                .await?;
            debug!("keyword '{}' matched {} works", keyword, docs.len());
            for doc in docs {
                if seen.insert(doc.id.clone()) {
                    found.push(Work::from(doc));
                }
            }
        }

        Ok(found)
    }

    async fn set_work_status(&self, id: &str, status: WorkStatus) -> Result<()> {
        self.works
            .update_one(
                doc! { "id": id },
                doc! { "$set": {
                    "status": status.as_str(),
                    "metadata.updated_at": bson::DateTime::now(),
                } },
            )
            .await?;
        Ok(())
    }

    async fn delete_work(&self, id: &str) -> Result<bool> {
        self.works.delete_one(doc! { "id": id }).await
    }
}

#[async_trait::async_trait]
impl ReviewDocumentStore for MongoDocumentStore {
    async fn review(&self, id: &str) -> Result<Option<WorkReview>> {
        Ok(self
            .reviews
            .find_one(doc! { "id": id })
            .await?
            .map(WorkReview::from))
    }

    async fn put_review(&self, review: &WorkReview) -> Result<()> {
        self.reviews
            .upsert_one(doc! { "id": review.id.as_str() }, WorkReviewDoc::from(review))
            .await
    }
}

#[async_trait::async_trait]
impl ProfileStore for MongoDocumentStore {
    async fn author(&self, participant_id: &str) -> Result<Option<AuthorProfile>> {
        Ok(self
            .authors
            .find_one(doc! { "id": participant_id })
            .await?
            .map(AuthorProfile::from))
    }

    async fn put_author(&self, profile: &AuthorProfile) -> Result<()> {
        self.authors
            .upsert_one(doc! { "id": profile.id.as_str() }, AuthorDoc::from(profile))
            .await
    }

    async fn validator(&self, participant_id: &str) -> Result<Option<ValidatorProfile>> {
        Ok(self
            .validators
            .find_one(doc! { "id": participant_id })
            .await?
            .map(ValidatorProfile::from))
    }

    async fn put_validator(&self, profile: &ValidatorProfile) -> Result<()> {
        self.validators
            .upsert_one(doc! { "id": profile.id.as_str() }, ValidatorDoc::from(profile))
            .await
    }
}
