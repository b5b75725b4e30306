//! In-memory stores
//!
//! Back every store trait for tests and for `--dev-mode` runs without
//! databases. Relational tables sit behind one lock so uniqueness checks and
//! conditional updates are atomic, like single statements in PostgreSQL.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::ParticipantRole;
use crate::library::{
    AuthorProfile, Bookmark, IdentityStore, LinkageStore, Participant, ProfileStore,
    PurchaseGrant, ReviewDocumentStore, ReviewLink, ReviewStatus, Stores, ValidatorProfile, Work,
    WorkDocumentStore, WorkLink, WorkReview, WorkStatus,
};
use crate::types::{LibraryError, Result};

#[derive(Default)]
struct Tables {
    participants: HashMap<String, Participant>,
    work_links: HashMap<String, WorkLink>,
    review_links: HashMap<String, ReviewLink>,
    grants: Vec<PurchaseGrant>,
    bookmarks: Vec<Bookmark>,
}

/// All five stores over process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    works: DashMap<String, Work>,
    reviews: DashMap<String, WorkReview>,
    authors: DashMap<String, AuthorProfile>,
    validators: DashMap<String, ValidatorProfile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stores {
    /// Bundle backed by a single [`MemoryStore`]
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            identity: store.clone(),
            profiles: store.clone(),
            works: store.clone(),
            reviews: store.clone(),
            linkage: store,
        }
    }
}

#[async_trait::async_trait]
impl IdentityStore for MemoryStore {
    async fn create_participant(&self, participant: Participant) -> Result<Participant> {
        let mut tables = self.tables.write().await;
        let taken = tables.participants.values().any(|p| {
            p.nickname == participant.nickname || p.web3_address == participant.web3_address
        });
        if taken {
            return Err(LibraryError::Conflict(format!(
                "participant {} already exists",
                participant.web3_address
            )));
        }
        tables
            .participants
            .insert(participant.id.clone(), participant.clone());
        Ok(participant)
    }

    async fn participant_by_address(&self, address: &str) -> Result<Option<Participant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .participants
            .values()
            .find(|p| p.web3_address == address)
            .cloned())
    }

    async fn participant_by_id(&self, id: &str) -> Result<Option<Participant>> {
        Ok(self.tables.read().await.participants.get(id).cloned())
    }

    async fn update_role(&self, id: &str, role: ParticipantRole) -> Result<ParticipantRole> {
        let mut tables = self.tables.write().await;
        let participant = tables
            .participants
            .get_mut(id)
            .ok_or_else(|| LibraryError::NotFound(format!("participant {id}")))?;
        participant.role = participant.role.max(role);
        Ok(participant.role)
    }

    async fn update_nickname(&self, id: &str, nickname: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .participants
            .values()
            .any(|p| p.id != id && p.nickname == nickname)
        {
            return Err(LibraryError::Conflict(format!(
                "nickname {nickname} is taken"
            )));
        }
        let participant = tables
            .participants
            .get_mut(id)
            .ok_or_else(|| LibraryError::NotFound(format!("participant {id}")))?;
        participant.nickname = nickname.to_string();
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryStore {
    async fn author(&self, participant_id: &str) -> Result<Option<AuthorProfile>> {
        Ok(self.authors.get(participant_id).map(|p| p.clone()))
    }

    async fn put_author(&self, profile: &AuthorProfile) -> Result<()> {
        self.authors.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn validator(&self, participant_id: &str) -> Result<Option<ValidatorProfile>> {
        Ok(self.validators.get(participant_id).map(|p| p.clone()))
    }

    async fn put_validator(&self, profile: &ValidatorProfile) -> Result<()> {
        self.validators.insert(profile.id.clone(), profile.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl WorkDocumentStore for MemoryStore {
    async fn put_work(&self, work: &Work) -> Result<()> {
        self.works.insert(work.id.clone(), work.clone());
        Ok(())
    }

    async fn works_by_ids(&self, ids: &[String]) -> Result<Vec<Work>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.works.get(id).map(|w| w.clone()))
            .collect())
    }

    async fn works_by_keywords(&self, keywords: &[String]) -> Result<Vec<Work>> {
        let needles: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        Ok(self
            .works
            .iter()
            .filter(|entry| {
                let name = entry.name.to_lowercase();
                let annotation = entry.annotation.to_lowercase();
                needles
                    .iter()
                    .any(|n| name.contains(n.as_str()) || annotation.contains(n.as_str()))
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn set_work_status(&self, id: &str, status: WorkStatus) -> Result<()> {
        if let Some(mut work) = self.works.get_mut(id) {
            work.status = status;
            work.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_work(&self, id: &str) -> Result<bool> {
        Ok(self.works.remove(id).is_some())
    }
}

#[async_trait::async_trait]
impl ReviewDocumentStore for MemoryStore {
    async fn review(&self, id: &str) -> Result<Option<WorkReview>> {
        Ok(self.reviews.get(id).map(|r| r.clone()))
    }

    async fn put_review(&self, review: &WorkReview) -> Result<()> {
        self.reviews.insert(review.id.clone(), review.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl LinkageStore for MemoryStore {
    async fn create_work_link(&self, link: &WorkLink) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.work_links.contains_key(&link.work_id) {
            return Err(LibraryError::Conflict(format!(
                "work {} already has a linkage row",
                link.work_id
            )));
        }
        tables.work_links.insert(link.work_id.clone(), link.clone());
        Ok(())
    }

    async fn work_link(&self, work_id: &str) -> Result<Option<WorkLink>> {
        Ok(self.tables.read().await.work_links.get(work_id).cloned())
    }

    async fn work_links(&self) -> Result<Vec<WorkLink>> {
        let tables = self.tables.read().await;
        let mut links: Vec<WorkLink> = tables.work_links.values().cloned().collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    async fn work_links_by_author(&self, participant_id: &str) -> Result<Vec<WorkLink>> {
        Ok(self
            .work_links()
            .await?
            .into_iter()
            .filter(|l| l.participant_id == participant_id)
            .collect())
    }

    async fn work_links_by_status(&self, status: WorkStatus) -> Result<Vec<WorkLink>> {
        Ok(self
            .work_links()
            .await?
            .into_iter()
            .filter(|l| l.status == status)
            .collect())
    }

    async fn transition_work_status(
        &self,
        work_id: &str,
        expected: WorkStatus,
        next: WorkStatus,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.work_links.get_mut(work_id) {
            Some(link) if link.status == expected => {
                link.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_work_link(&self, work_id: &str) -> Result<bool> {
        Ok(self.tables.write().await.work_links.remove(work_id).is_some())
    }

    async fn review_link(
        &self,
        participant_id: &str,
        work_id: &str,
    ) -> Result<Option<ReviewLink>> {
        let tables = self.tables.read().await;
        Ok(tables
            .review_links
            .values()
            .find(|r| r.participant_id == participant_id && r.work_id == work_id)
            .cloned())
    }

    async fn ensure_review_link(&self, link: ReviewLink) -> Result<ReviewLink> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .review_links
            .values()
            .find(|r| r.participant_id == link.participant_id && r.work_id == link.work_id)
        {
            return Ok(existing.clone());
        }
        tables.review_links.insert(link.id.clone(), link.clone());
        Ok(link)
    }

    async fn review_links(&self, work_id: &str) -> Result<Vec<ReviewLink>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ReviewLink> = tables
            .review_links
            .values()
            .filter(|r| r.work_id == work_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn set_review_status(
        &self,
        id: &str,
        status: ReviewStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .review_links
            .get_mut(id)
            .ok_or_else(|| LibraryError::NotFound(format!("review {id}")))?;
        row.status = status;
        row.updated_at = updated_at;
        Ok(())
    }

    async fn create_grant(&self, grant: &PurchaseGrant) -> Result<()> {
        self.tables.write().await.grants.push(grant.clone());
        Ok(())
    }

    async fn grants(&self, participant_id: &str, work_id: &str) -> Result<Vec<PurchaseGrant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .grants
            .iter()
            .filter(|g| g.participant_id == participant_id && g.work_id == work_id)
            .cloned()
            .collect())
    }

    async fn grants_by_participant(&self, participant_id: &str) -> Result<Vec<PurchaseGrant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .grants
            .iter()
            .filter(|g| g.participant_id == participant_id)
            .cloned()
            .collect())
    }

    async fn delete_grants(&self, work_id: &str) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.grants.len();
        tables.grants.retain(|g| g.work_id != work_id);
        Ok((before - tables.grants.len()) as u64)
    }

    async fn create_bookmark(&self, bookmark: &Bookmark) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let exists = tables
            .bookmarks
            .iter()
            .any(|b| b.participant_id == bookmark.participant_id && b.work_id == bookmark.work_id);
        if exists {
            return Ok(false);
        }
        tables.bookmarks.push(bookmark.clone());
        Ok(true)
    }

    async fn has_bookmark(&self, participant_id: &str, work_id: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookmarks
            .iter()
            .any(|b| b.participant_id == participant_id && b.work_id == work_id))
    }

    async fn bookmarked_work_ids(&self, participant_id: &str) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookmarks
            .iter()
            .filter(|b| b.participant_id == participant_id)
            .map(|b| b.work_id.clone())
            .collect())
    }

    async fn delete_bookmark(&self, participant_id: &str, work_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.bookmarks.len();
        tables
            .bookmarks
            .retain(|b| !(b.participant_id == participant_id && b.work_id == work_id));
        Ok(tables.bookmarks.len() != before)
    }

    async fn delete_bookmarks(&self, work_id: &str) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.bookmarks.len();
        tables.bookmarks.retain(|b| b.work_id != work_id);
        Ok((before - tables.bookmarks.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(nickname: &str, address: &str) -> Participant {
        Participant::new(nickname, address, ParticipantRole::Reader, Utc::now())
    }

    #[tokio::test]
    async fn test_duplicate_participant_conflicts() {
        let store = MemoryStore::new();
        store
            .create_participant(participant("alice", "0x01"))
            .await
            .unwrap();

        let dup_nick = store.create_participant(participant("alice", "0x02")).await;
        assert!(matches!(dup_nick, Err(LibraryError::Conflict(_))));

        let dup_address = store.create_participant(participant("bob", "0x01")).await;
        assert!(matches!(dup_address, Err(LibraryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_conditional_status_write() {
        let store = MemoryStore::new();
        let link = WorkLink {
            id: "l1".into(),
            participant_id: "author".into(),
            work_id: "w1".into(),
            status: WorkStatus::Review,
            created_at: Utc::now(),
        };
        store.create_work_link(&link).await.unwrap();

        assert!(store
            .transition_work_status("w1", WorkStatus::Review, WorkStatus::Open)
            .await
            .unwrap());
        assert!(!store
            .transition_work_status("w1", WorkStatus::Review, WorkStatus::Declined)
            .await
            .unwrap());
        let stored = store.work_link("w1").await.unwrap().unwrap();
        assert_eq!(stored.status, WorkStatus::Open);
    }

    #[tokio::test]
    async fn test_ensure_review_link_keeps_first_row() {
        let store = MemoryStore::new();
        let first = store
            .ensure_review_link(ReviewLink::new("v1", "w1", Utc::now()))
            .await
            .unwrap();
        let second = store
            .ensure_review_link(ReviewLink::new("v1", "w1", Utc::now()))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.review_links("w1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_keyword_search_is_case_insensitive_and_deduplicated() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (id, name, annotation) in [
            ("w1", "Monofin Hydrodynamics", "single blade"),
            ("w2", "Freediving", "breath-hold with a MONOFIN"),
            ("w3", "Cartography", "maps"),
        ] {
            store
                .put_work(&Work {
                    id: id.into(),
                    name: name.into(),
                    annotation: annotation.into(),
                    author_id: "a".into(),
                    tags: vec![],
                    price: String::new(),
                    sources: String::new(),
                    language: String::new(),
                    status: WorkStatus::Open,
                    content: None,
                    created_at: now,
                    updated_at: now,
                    released_at: None,
                })
                .await
                .unwrap();
        }

        let mut found: Vec<String> = store
            .works_by_keywords(&["monofin".into(), "blade".into()])
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        found.sort();
        assert_eq!(found, vec!["w1".to_string(), "w2".to_string()]);
    }

    #[tokio::test]
    async fn test_bookmarks_are_idempotent() {
        let store = MemoryStore::new();
        let now = Utc::now();
        assert!(store
            .create_bookmark(&Bookmark::new("r", "w", now))
            .await
            .unwrap());
        assert!(!store
            .create_bookmark(&Bookmark::new("r", "w", now))
            .await
            .unwrap());
        assert!(store.delete_bookmark("r", "w").await.unwrap());
        assert!(!store.delete_bookmark("r", "w").await.unwrap());
    }
}
