//! Review aggregator
//!
//! One review per (validator, work). The relational row carries the review
//! status; the document with the same id carries the body. A submission can
//! conclude the work's review pool, which confirms or declines the work.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::works::WorkRepository;
use super::{log_upstream, require_role, Core};
use crate::auth::ParticipantRole;
use crate::library::{ReviewDraft, ReviewLink, ReviewStatus, WorkReview, WorkStatus};
use crate::types::{LibraryError, Result};

/// Result of a submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub review: ReviewLink,
    /// Whether this submission concluded the review pool
    pub last_review: bool,
    pub work_status: WorkStatus,
}

#[derive(Clone)]
pub struct ReviewAggregator {
    core: Arc<Core>,
    repository: WorkRepository,
}

impl ReviewAggregator {
    pub(crate) fn new(core: Arc<Core>, repository: WorkRepository) -> Self {
        Self { core, repository }
    }

    /// Create the caller's review of a work, or merge into the existing one
    pub async fn create_or_update(&self, address: &str, draft: ReviewDraft) -> Result<WorkReview> {
        let validator = self
            .core
            .participant_with_role(address, ParticipantRole::Validator)
            .await?;
        draft.validate()?;

        let (_, link) = self.repository.get(&draft.work_id).await?;
        if link.participant_id == validator.id {
            return Err(LibraryError::Forbidden(format!(
                "validation not allowed: {} authored work {}",
                validator.web3_address, draft.work_id
            )));
        }

        let ids = format!("{} on {}", validator.web3_address, draft.work_id);
        let now = self.core.clock.now();
        let row = self
            .core
            .stores
            .linkage
            .ensure_review_link(ReviewLink::new(&validator.id, &draft.work_id, now))
            .await
            .map_err(|e| log_upstream("update_review", &ids, e))?;

        let review = match self.core.stores.reviews.review(&row.id).await? {
            Some(mut review) => {
                review.body.merge(draft.body);
                if !draft.language.is_empty() {
                    review.language = draft.language;
                }
                review.status = row.status;
                review.updated_at = now;
                review
            }
            None => WorkReview {
                id: row.id.clone(),
                work_id: draft.work_id,
                body: draft.body,
                status: row.status,
                language: draft.language,
                created_at: now,
                updated_at: now,
            },
        };

        self.core
            .stores
            .reviews
            .put_review(&review)
            .await
            .map_err(|e| log_upstream("update_review", &ids, e))?;
        debug!("Stored review {} ({})", review.id, ids);
        Ok(review)
    }

    /// Set the caller's review status and settle the work if this concludes
    /// the pool.
    ///
    /// Whether the pool is concluded is decided on the rows as they were
    /// before this write, using the configured quorum.
    pub async fn submit(
        &self,
        address: &str,
        work_id: &str,
        status: ReviewStatus,
    ) -> Result<SubmitOutcome> {
        let validator = self
            .core
            .participant_with_role(address, ParticipantRole::Validator)
            .await?;

        let ids = format!("{} on {}", validator.web3_address, work_id);
        let rows = self
            .core
            .stores
            .linkage
            .review_links(work_id)
            .await
            .map_err(|e| log_upstream("submit_work_review", &ids, e))?;
        if rows.is_empty() {
            return Err(LibraryError::NoReviews(format!("work {work_id}")));
        }
        let mut own = rows
            .iter()
            .find(|r| r.participant_id == validator.id)
            .cloned()
            .ok_or_else(|| {
                LibraryError::NotFound(format!(
                    "review of {} for work {work_id}",
                    validator.web3_address
                ))
            })?;

        let last_review = self.core.config.review_quorum.is_last_review(&rows, &own.id);
        let now = self.core.clock.now();

        self.core
            .stores
            .linkage
            .set_review_status(&own.id, status, now)
            .await
            .map_err(|e| log_upstream("submit_work_review", &ids, e))?;
        own.status = status;
        own.updated_at = now;

        if let Some(mut review) = self
            .core
            .stores
            .reviews
            .review(&own.id)
            .await
            .map_err(|e| log_upstream("submit_work_review", &ids, e))?
        {
            review.status = status;
            review.updated_at = now;
            self.core
                .stores
                .reviews
                .put_review(&review)
                .await
                .map_err(|e| log_upstream("submit_work_review", &ids, e))?;
        }

        let transition = if last_review {
            status.work_transition()
        } else {
            None
        };
        let work_status = match transition {
            Some(transition) => self.repository.transition(work_id, transition).await?,
            None => self.repository.get(work_id).await?.1.status,
        };

        info!(
            "Review {} set to {} (last review: {}, work {})",
            ids, status, last_review, work_status
        );
        Ok(SubmitOutcome {
            review: own,
            last_review,
            work_status,
        })
    }

    /// The caller's own review of a work; None when it has not reviewed it
    pub async fn review_for_validator(
        &self,
        address: &str,
        work_id: &str,
    ) -> Result<Option<WorkReview>> {
        let validator = self
            .core
            .participant_with_role(address, ParticipantRole::Validator)
            .await?;

        let Some(row) = self
            .core
            .stores
            .linkage
            .review_link(&validator.id, work_id)
            .await?
        else {
            return Ok(None);
        };
        self.document_for(row).await
    }

    /// Every review of a work, for validators
    pub async fn reviews_by_work(&self, address: &str, work_id: &str) -> Result<Vec<WorkReview>> {
        self.core
            .participant_with_role(address, ParticipantRole::Validator)
            .await?;
        self.repository.get(work_id).await?;
        self.collect(work_id).await
    }

    /// Every review of a work, for its author. Validators and above may read
    /// any work's reviews.
    pub async fn reviews_for_author(
        &self,
        address: &str,
        work_id: &str,
    ) -> Result<Vec<WorkReview>> {
        let caller = self.core.participant(address).await?;
        require_role(&caller, ParticipantRole::Author)?;

        let (_, link) = self.repository.get(work_id).await?;
        if link.participant_id != caller.id && caller.role < ParticipantRole::Validator {
            return Err(LibraryError::Forbidden(format!(
                "{} is not the author of work {work_id}",
                caller.web3_address
            )));
        }
        self.collect(work_id).await
    }

    /// Status rows of every review of a work
    pub async fn review_statuses(&self, address: &str, work_id: &str) -> Result<Vec<ReviewLink>> {
        self.core
            .participant_with_role(address, ParticipantRole::Validator)
            .await?;
        self.core.stores.linkage.review_links(work_id).await
    }

    async fn collect(&self, work_id: &str) -> Result<Vec<WorkReview>> {
        let rows = self.core.stores.linkage.review_links(work_id).await?;
        let mut reviews = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(review) = self.document_for(row).await? {
                reviews.push(review);
            }
        }
        Ok(reviews)
    }

    /// Review document for a row, with the row's status
    async fn document_for(&self, row: ReviewLink) -> Result<Option<WorkReview>> {
        let review = self.core.stores.reviews.review(&row.id).await?;
        if review.is_none() {
            debug!("Review row {} has no document", row.id);
        }
        Ok(review.map(|mut review| {
            review.status = row.status;
            review
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::library::{
        ManualClock, NewWork, ProfileFields, Registration, ReviewBody, Stores, WorkContent,
    };
    use crate::services::{Library, LibraryConfig};

    const AUTHOR: &str = "0x00000000000000000000000000000000000000a1";
    const VALIDATOR: &str = "0x00000000000000000000000000000000000000c1";
    const OUTSIDER: &str = "0x00000000000000000000000000000000000000a2";

    fn fields() -> ProfileFields {
        ProfileFields {
            email_address: "x@science.org".into(),
            name: "X".into(),
            surname: "Y".into(),
            language: "en".into(),
            ..Default::default()
        }
    }

    fn text(review: &str) -> ReviewBody {
        ReviewBody {
            questionnaire: None,
            review: review.into(),
        }
    }

    async fn setup() -> (Library, String) {
        let lib = Library::new(
            Stores::in_memory(),
            Arc::new(InMemoryLedger::new()),
            Arc::new(ManualClock::default()),
            LibraryConfig::default(),
        );
        let people = [
            ("author", AUTHOR),
            ("validator", VALIDATOR),
            ("outsider", OUTSIDER),
        ];
        for (nickname, address) in people {
            lib.identity
                .register(Registration {
                    nickname: nickname.into(),
                    web3_address: address.into(),
                })
                .await
                .unwrap();
        }
        lib.identity.become_author(AUTHOR, fields()).await.unwrap();
        lib.identity.become_author(OUTSIDER, fields()).await.unwrap();
        lib.identity
            .become_validator(VALIDATOR, fields())
            .await
            .unwrap();

        let work = lib
            .works
            .publish(
                AUTHOR,
                NewWork {
                    name: "Tides".into(),
                    annotation: "Moon and sea".into(),
                    tags: vec![],
                    price: String::new(),
                    sources: String::new(),
                    language: "en".into(),
                    content: Some(WorkContent {
                        work_data: "full text".into(),
                    }),
                },
            )
            .await
            .unwrap()
            .work;
        (lib, work.id)
    }

    #[tokio::test]
    async fn test_update_merges_into_existing_review() {
        let (lib, work_id) = setup().await;
        let first = lib
            .reviews
            .create_or_update(
                VALIDATOR,
                ReviewDraft {
                    work_id: work_id.clone(),
                    language: "en".into(),
                    body: text("first"),
                },
            )
            .await
            .unwrap();
        assert_eq!(first.status, ReviewStatus::InProgress);

        let second = lib
            .reviews
            .create_or_update(
                VALIDATOR,
                ReviewDraft {
                    work_id: work_id.clone(),
                    language: String::new(),
                    body: text("second"),
                },
            )
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.body.review, "second");
        assert_eq!(second.language, "en");
    }

    #[tokio::test]
    async fn test_review_read_without_review_is_empty() {
        let (lib, work_id) = setup().await;
        assert!(lib
            .reviews
            .review_for_validator(VALIDATOR, &work_id)
            .await
            .unwrap()
            .is_none());
        assert!(lib
            .reviews
            .reviews_for_author(AUTHOR, &work_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_submit_without_rows_is_no_reviews() {
        let (lib, work_id) = setup().await;
        assert!(matches!(
            lib.reviews
                .submit(VALIDATOR, &work_id, ReviewStatus::Submitted)
                .await,
            Err(LibraryError::NoReviews(_))
        ));
    }

    #[tokio::test]
    async fn test_author_role_cannot_review() {
        let (lib, work_id) = setup().await;
        let result = lib
            .reviews
            .create_or_update(
                AUTHOR,
                ReviewDraft {
                    work_id,
                    language: String::new(),
                    body: text("mine"),
                },
            )
            .await;
        assert!(matches!(result, Err(LibraryError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_other_authors_cannot_read_reviews() {
        let (lib, work_id) = setup().await;
        lib.reviews
            .create_or_update(
                VALIDATOR,
                ReviewDraft {
                    work_id: work_id.clone(),
                    language: String::new(),
                    body: text("solid"),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            lib.reviews
                .reviews_for_author(AUTHOR, &work_id)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(matches!(
            lib.reviews.reviews_for_author(OUTSIDER, &work_id).await,
            Err(LibraryError::Forbidden(_))
        ));
        assert_eq!(
            lib.reviews
                .review_statuses(VALIDATOR, &work_id)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
